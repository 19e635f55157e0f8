//! Hearth Test: shared test utilities for the Hearth crates.
//!
//! Fixtures for modules, user records and file engines, a data store that
//! fails on demand, and logging setup for tests.
//!
//! ```toml
//! [dev-dependencies]
//! hearth-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use hearth_test::{temp_file_store, user_record};
//!
//! #[tokio::test(flavor = "multi_thread")]
//! async fn test_users_survive_restart() {
//!     let (dir, engine) = temp_file_store(true);
//!     // ...
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
