//! Hearth IoC: service discovery and registration for the host runtime.
//!
//! At startup the host scans every loaded [`Module`] for types that declare
//! an implementation marker (such as [`ServiceImplementation`]) and
//! implement at least one [`ServiceContract`]. The resulting
//! [`ServiceRegistration`]s are merged by [`ServiceResolver`], which orders
//! competing implementations of a contract by priority (lower wins, ties go
//! to the first discovered).
//!
//! ```text
//! Module ──loadable_types──▶ TypeDefinition* ──find_registrations::<M>──▶
//!   ServiceRegistration* ──ServiceResolver──▶ winner per contract
//! ```
//!
//! Partial module loads, marked types without contracts, and malformed
//! metadata are logged and surfaced as [`ScanDiagnostic`]s; they never abort
//! a scan.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod introspect;
pub mod module;
pub mod resolver;
pub mod resources;
pub mod scanner;
pub mod types;

pub use error::{IocError, IocResult, TypeLoadError};
pub use introspect::{LoadableTypes, loadable_types};
pub use module::{
    Module, ModuleBuilder, Resource, ResourceRegistration, TypeRegistration, TypeResolver,
};
pub use resolver::ServiceResolver;
pub use resources::{DIRECTORY_MARKER_SUFFIX, extract_resources};
pub use scanner::{Registrations, ScanDiagnostic, ServiceRegistration, find_registrations};
pub use types::{
    ContractRef, ImplementationMarker, Marker, MarkerOrigin, PluginServiceImplementation,
    ServiceContract, ServiceImplementation, ServiceLifetime, TypeDefinition, TypeKind, priority,
};

/// Re-exported so registrations can be submitted without a direct dependency.
pub use inventory;
