//! Test fixtures for common types.

use std::sync::Arc;
use std::time::Duration;

use hearth_ioc::{
    ContractRef, Marker, Module, ServiceContract, ServiceImplementation, ServiceLifetime,
    TypeDefinition, priority,
};
use hearth_storage::{FileDataStore, FileStoreConfig};
use hearth_users::{DataValue, UserData, UsersData};
use tempfile::TempDir;

/// Debounce used by [`temp_file_store`].
pub const TEST_DEBOUNCE: Duration = Duration::from_millis(50);

/// Service contract used by [`sample_module`].
pub trait SampleService: Send + Sync {}

impl ServiceContract for dyn SampleService {
    const NAME: &'static str = "hearth.test.SampleService";
}

/// A module with one of each discovery outcome:
///
/// - `{name}.DefaultSample`: `SampleService` at `LOWEST`, singleton
/// - `{name}.Optional`: fails to load
/// - `{name}.Unbound`: marked, but implements no service contract
/// - `{name}.Helper`: unmarked
///
/// plus a `{name}.config.yaml` resource.
#[must_use]
pub fn sample_module(name: &str) -> Module {
    Module::builder(name)
        .with_type(
            TypeDefinition::concrete(format!("{name}.DefaultSample"))
                .with_marker(
                    Marker::declared::<ServiceImplementation>()
                        .with_priority(priority::LOWEST)
                        .with_lifetime(ServiceLifetime::Singleton),
                )
                .implements::<dyn SampleService>(),
        )
        .with_unresolvable(format!("{name}.Optional"), "missing optional dependency")
        .with_type(
            TypeDefinition::concrete(format!("{name}.Unbound"))
                .with_marker(Marker::declared::<ServiceImplementation>())
                .with_contract(ContractRef::plain("core.Display")),
        )
        .with_type(TypeDefinition::concrete(format!("{name}.Helper")))
        .with_resource(format!("{name}.config.yaml"), "enabled: true\n")
        .build()
}

/// A module whose single type overrides `SampleService` at `priority`.
#[must_use]
pub fn override_module(name: &str, priority: i32) -> Module {
    Module::builder(name)
        .with_type(
            TypeDefinition::concrete(format!("{name}.Sample"))
                .with_marker(Marker::declared::<ServiceImplementation>().with_priority(priority))
                .implements::<dyn SampleService>(),
        )
        .build()
}

/// A user record with a display name and one data field.
#[must_use]
pub fn user_record(id: &str, user_type: &str) -> UserData {
    UserData::new(id, user_type)
        .with_display_name(format!("{id} (test)"))
        .with_data("visits", DataValue::Int(1))
}

/// A users document holding `records` in order.
#[must_use]
pub fn users_document(records: impl IntoIterator<Item = UserData>) -> UsersData {
    UsersData {
        users: records.into_iter().collect(),
    }
}

/// A file engine in a fresh temporary directory with a short debounce.
///
/// Keep the `TempDir` alive for as long as the store is used. Watching needs
/// a Tokio runtime.
///
/// # Panics
///
/// Panics if the directory or the store cannot be created.
#[must_use]
pub fn temp_file_store(watch: bool) -> (TempDir, Arc<FileDataStore>) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let store = reopen_file_store(&dir, watch);
    (dir, store)
}

/// Open another file engine over an existing directory, as a restarted host
/// would.
///
/// # Panics
///
/// Panics if the store cannot be opened.
#[must_use]
pub fn reopen_file_store(dir: &TempDir, watch: bool) -> Arc<FileDataStore> {
    let config = FileStoreConfig::new(dir.path())
        .with_watch(watch)
        .with_debounce(TEST_DEBOUNCE);
    Arc::new(FileDataStore::open(config).expect("Failed to open file store"))
}
