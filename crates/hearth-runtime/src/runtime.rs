//! Host lifecycle.

use std::sync::Arc;

use hearth_config::HostConfig;
use hearth_events::{EventBus, EventMetadata, HostEvent};
use hearth_ioc::{Module, ServiceImplementation, ServiceRegistration, ServiceResolver};
use hearth_storage::{DataStore, FileDataStore, HostContext};
use hearth_users::{CachedUserDataStore, MODULE_NAME, PermissionStore, UserDataStore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config_bridge::to_store_config;
use crate::error::RuntimeResult;

/// Event source used for everything the runtime publishes.
const EVENT_SOURCE: &str = "hearth-runtime";

/// A started host: resolved services, the user store and the event bus.
///
/// Created by [`Runtime::start`]; stop it with [`Runtime::shutdown`].
#[derive(Debug)]
pub struct Runtime {
    context: HostContext,
    events: EventBus,
    resolver: ServiceResolver,
    users: Arc<CachedUserDataStore>,
    permissions: PermissionStore,
    reload_forwarder: JoinHandle<()>,
}

impl Runtime {
    /// Modules the host always contributes: the registry of `hearth-users`.
    #[must_use]
    pub fn builtin_modules() -> Vec<Module> {
        vec![Module::from_registry(MODULE_NAME)]
    }

    /// Start a host over a file engine in `config.data.directory`.
    ///
    /// # Errors
    ///
    /// Fails if the data directory cannot be opened or the user store
    /// cannot be initialized.
    pub async fn start(config: &HostConfig, modules: &[Module]) -> RuntimeResult<Self> {
        let engine = FileDataStore::open(to_store_config(config))?;
        info!(
            directory = %config.data.directory.display(),
            watch = config.watch.enabled,
            "Opened data directory"
        );
        Self::start_with_engine(config, Arc::new(engine), modules).await
    }

    /// Start a host over an existing engine.
    ///
    /// # Errors
    ///
    /// Fails if the user store cannot be initialized.
    pub async fn start_with_engine(
        config: &HostConfig,
        engine: Arc<dyn DataStore>,
        modules: &[Module],
    ) -> RuntimeResult<Self> {
        let context = HostContext::new("hearth");
        let events = EventBus::new();

        let resolver = ServiceResolver::scan::<ServiceImplementation>(modules);
        log_user_store_binding(&resolver);

        let users = Arc::new(CachedUserDataStore::with_key(
            engine,
            config.data.users_key.clone(),
            context.child("users"),
        ));
        users.initialize().await?;

        let permissions = PermissionStore::new(users.clone(), events.clone());
        let reload_forwarder = spawn_reload_forwarder(&users, events.clone());

        events.publish(HostEvent::RuntimeStarted {
            metadata: EventMetadata::new(EVENT_SOURCE),
            version: env!("CARGO_PKG_VERSION").to_string(),
        });
        events.publish(HostEvent::ServicesResolved {
            metadata: EventMetadata::new(EVENT_SOURCE),
            modules: modules.len(),
            contracts: resolver.contracts().count(),
            registrations: resolver.len(),
        });

        info!(
            modules = modules.len(),
            registrations = resolver.len(),
            users_key = %config.data.users_key,
            "Runtime started"
        );

        Ok(Self {
            context,
            events,
            resolver,
            users,
            permissions,
            reload_forwarder,
        })
    }

    /// The user store.
    #[must_use]
    pub fn users(&self) -> Arc<dyn UserDataStore> {
        self.users.clone()
    }

    /// The built-in user store, for access to its cached document.
    #[must_use]
    pub fn user_store(&self) -> &CachedUserDataStore {
        &self.users
    }

    /// Permission and role operations over the user store.
    #[must_use]
    pub fn permissions(&self) -> &PermissionStore {
        &self.permissions
    }

    /// The host event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Service registrations resolved at startup.
    #[must_use]
    pub fn resolver(&self) -> &ServiceResolver {
        &self.resolver
    }

    /// The host context every watch was registered with.
    #[must_use]
    pub fn context(&self) -> &HostContext {
        &self.context
    }

    /// Dispose the user store, cancel the host context and publish
    /// `RuntimeStopped`.
    ///
    /// The context is cancelled and the event published even if disposal
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns the disposal error, e.g. when the final save fails.
    pub async fn shutdown(self, reason: Option<String>) -> RuntimeResult<()> {
        self.reload_forwarder.abort();
        let disposed = self.users.dispose().await;
        self.context.shutdown();

        self.events.publish(HostEvent::RuntimeStopped {
            metadata: EventMetadata::new(EVENT_SOURCE),
            reason,
        });

        match disposed {
            Ok(()) => {
                info!("Runtime stopped");
                Ok(())
            },
            Err(e) => {
                warn!(error = %e, "User store disposal failed during shutdown");
                Err(e.into())
            },
        }
    }
}

/// The winning `UserDataStore` registration when it is not the built-in
/// store. The runtime only constructs [`CachedUserDataStore`], so such a
/// registration is ignored.
fn ignored_user_store_override(resolver: &ServiceResolver) -> Option<&ServiceRegistration> {
    resolver
        .resolve_contract::<dyn UserDataStore>()
        .filter(|binding| binding.implementation_type != CachedUserDataStore::TYPE_NAME)
}

fn log_user_store_binding(resolver: &ServiceResolver) {
    if let Some(binding) = ignored_user_store_override(resolver) {
        warn!(
            implementation = %binding.implementation_type,
            module = %binding.module,
            "UserDataStore override is not constructed by the runtime; using the built-in store"
        );
        return;
    }
    match resolver.resolve_contract::<dyn UserDataStore>() {
        Some(binding) => debug!(module = %binding.module, "User data store bound"),
        None => warn!("No UserDataStore registration found; using the built-in store"),
    }
}

/// Publish `UserDataReloaded` every time the users document reloads.
fn spawn_reload_forwarder(users: &CachedUserDataStore, events: EventBus) -> JoinHandle<()> {
    let document = users.document();
    let key = document.key().to_owned();
    let mut reloads = document.subscribe_reloads();

    tokio::spawn(async move {
        while reloads.changed().await.is_ok() {
            let count = *reloads.borrow_and_update();
            debug!(key = %key, reloads = count, "Forwarding reload");
            events.publish(HostEvent::UserDataReloaded {
                metadata: EventMetadata::new(EVENT_SOURCE),
                key: key.clone(),
                reloads: count,
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use hearth_ioc::{Marker, ScanDiagnostic, TypeDefinition, priority};
    use hearth_storage::MemoryDataStore;
    use hearth_users::{USERS_KEY, actor_type};

    use super::*;

    async fn start_in_memory(modules: &[Module]) -> (Arc<MemoryDataStore>, Runtime) {
        let engine = Arc::new(MemoryDataStore::new());
        let runtime = Runtime::start_with_engine(&HostConfig::default(), engine.clone(), modules)
            .await
            .unwrap();
        (engine, runtime)
    }

    #[tokio::test]
    async fn test_start_binds_builtin_user_store() {
        let (engine, runtime) = start_in_memory(&Runtime::builtin_modules()).await;

        let binding = runtime
            .resolver()
            .resolve_contract::<dyn UserDataStore>()
            .unwrap();
        assert_eq!(binding.implementation_type, CachedUserDataStore::TYPE_NAME);
        assert!(engine.exists(USERS_KEY).await.unwrap());

        runtime.shutdown(None).await.unwrap();
    }

    #[test]
    fn test_only_foreign_user_store_winner_is_reported_ignored() {
        let builtin = ServiceResolver::scan::<ServiceImplementation>(&Runtime::builtin_modules());
        assert!(ignored_user_store_override(&builtin).is_none());
        let empty = ServiceResolver::scan::<ServiceImplementation>(&[]);
        assert!(ignored_user_store_override(&empty).is_none());

        let plugin = Module::builder("plugin")
            .with_type(
                TypeDefinition::concrete("plugin.SqlUserDataStore")
                    .with_marker(
                        Marker::declared::<ServiceImplementation>().with_priority(priority::HIGH),
                    )
                    .implements::<dyn UserDataStore>(),
            )
            .build();
        let mut modules = Runtime::builtin_modules();
        modules.push(plugin);
        let overridden = ServiceResolver::scan::<ServiceImplementation>(&modules);
        let ignored = ignored_user_store_override(&overridden).unwrap();
        assert_eq!(ignored.implementation_type, "plugin.SqlUserDataStore");
        assert_eq!(ignored.module, "plugin");
    }

    #[tokio::test]
    async fn test_start_without_binding_still_serves_users() {
        let (_engine, runtime) = start_in_memory(&[]).await;
        assert!(runtime.resolver().is_empty());
        assert!(
            runtime
                .users()
                .get_user_data("root", actor_type::RCON)
                .await
                .unwrap()
                .is_some()
        );
        runtime.shutdown(None).await.unwrap();
    }

    #[tokio::test]
    async fn test_lifecycle_events() {
        let engine = Arc::new(MemoryDataStore::new());
        let runtime = Runtime::start_with_engine(
            &HostConfig::default(),
            engine,
            &Runtime::builtin_modules(),
        )
        .await
        .unwrap();
        let events = runtime.events().clone();
        let mut receiver = events.subscribe();
        let context = runtime.context().clone();

        runtime.shutdown(Some("test".into())).await.unwrap();
        assert!(context.is_shut_down());

        let event = receiver.recv().await.unwrap();
        match event.as_ref() {
            HostEvent::RuntimeStopped { reason, .. } => {
                assert_eq!(reason.as_deref(), Some("test"));
            },
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_external_change_is_forwarded() {
        let (engine, runtime) = start_in_memory(&Runtime::builtin_modules()).await;
        let mut receiver = runtime.events().subscribe();

        engine
            .write_external(USERS_KEY, serde_json::json!({"users": []}))
            .unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(2), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        match event.as_ref() {
            HostEvent::UserDataReloaded { key, reloads, .. } => {
                assert_eq!(key, USERS_KEY);
                assert_eq!(*reloads, 1);
            },
            other => panic!("unexpected event: {other:?}"),
        }

        runtime.shutdown(None).await.unwrap();
    }

    #[tokio::test]
    async fn test_scan_diagnostics_are_kept() {
        let broken = Module::builder("broken")
            .with_unresolvable("broken.Missing", "dependency not loaded")
            .build();
        let (_engine, runtime) = start_in_memory(&[broken]).await;
        assert!(matches!(
            runtime.resolver().diagnostics(),
            [ScanDiagnostic::PartialLoad { .. }]
        ));
        runtime.shutdown(None).await.unwrap();
    }
}
