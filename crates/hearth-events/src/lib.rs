//! Hearth Events: event bus for the Hearth host runtime.
//!
//! Events are published to an [`EventBus`] and delivered to every
//! [`EventReceiver`] obtained from `bus.subscribe()`.
//!
//! ```rust
//! use hearth_events::{EventBus, EventMetadata, HostEvent};
//!
//! # async fn example() {
//! let bus = EventBus::new();
//! let mut receiver = bus.subscribe();
//!
//! bus.publish(HostEvent::RuntimeStarted {
//!     metadata: EventMetadata::new("runtime"),
//!     version: "0.1.0".to_string(),
//! });
//!
//! let event = receiver.recv().await.unwrap();
//! assert_eq!(event.event_type(), "runtime_started");
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod bus;
mod event;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventReceiver};
pub use event::{EventMetadata, HostEvent, PermissionType};
