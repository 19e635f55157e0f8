//! Hearth Users: persistent per-actor records.
//!
//! Every actor the host sees (players, consoles, remote consoles) gets a
//! [`UserData`] record identified by `(id, type)`, compared without regard
//! to case. Records carry permissions, roles and a free-form `data` map of
//! [`DataValue`]s that callers read and write with typed accessors:
//!
//! ```no_run
//! # async fn demo(store: &dyn hearth_users::UserDataStore) -> hearth_users::UserStoreResult<()> {
//! use hearth_users::UserDataStoreExt;
//!
//! store.set_field("steve", "player", "coins", 120_u32).await?;
//! let coins: Option<u32> = store.get_field("steve", "player", "coins").await?;
//! assert_eq!(coins, Some(120));
//! # Ok(())
//! # }
//! ```
//!
//! [`CachedUserDataStore`] is the default [`UserDataStore`]. It keeps all
//! records in one cached [`UsersData`] document and registers itself in the
//! `hearth-users` module at the lowest priority.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod cached;
pub mod error;
pub mod permissions;
pub mod record;
pub mod store;
pub mod value;

pub use cached::{CachedUserDataStore, MODULE_NAME};
pub use error::{UserStoreError, UserStoreResult};
pub use permissions::PermissionStore;
pub use record::{USERS_KEY, UserData, UsersData, actor_type};
pub use store::{UserDataStore, UserDataStoreExt, UserEdit};
pub use value::{ConversionError, DataValue, FromDataValue, IntoDataValue, Structured};
