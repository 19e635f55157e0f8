//! Event types for the Hearth event bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata attached to every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// Source component that generated the event.
    pub source: String,
}

impl EventMetadata {
    /// Create new event metadata.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
        }
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::new("unknown")
    }
}

/// Whether a permission grants or denies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionType {
    /// The permission allows the action.
    Grant,
    /// The permission (written with a leading `!`) forbids the action.
    Deny,
}

impl PermissionType {
    /// Classify a permission string.
    #[must_use]
    pub fn of(permission: &str) -> Self {
        if permission.starts_with('!') {
            Self::Deny
        } else {
            Self::Grant
        }
    }
}

/// All events that can occur in the Hearth host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    // ========== Lifecycle ==========
    /// Runtime started.
    RuntimeStarted {
        /// Event metadata.
        metadata: EventMetadata,
        /// Runtime version.
        version: String,
    },

    /// Runtime stopped.
    RuntimeStopped {
        /// Event metadata.
        metadata: EventMetadata,
        /// Reason for stopping.
        reason: Option<String>,
    },

    /// Module scanning finished and services were resolved.
    ServicesResolved {
        /// Event metadata.
        metadata: EventMetadata,
        /// Number of modules scanned.
        modules: usize,
        /// Number of distinct service contracts with at least one binding.
        contracts: usize,
        /// Total registrations found.
        registrations: usize,
    },

    // ========== Permissions ==========
    /// A permission was added to an actor.
    PermissionAdded {
        /// Event metadata.
        metadata: EventMetadata,
        /// Actor ID.
        actor_id: String,
        /// Actor type discriminator.
        actor_type: String,
        /// The permission as stored, including any `!` prefix.
        permission: String,
        /// Grant or deny.
        permission_type: PermissionType,
    },

    /// A permission was removed from an actor.
    PermissionRemoved {
        /// Event metadata.
        metadata: EventMetadata,
        /// Actor ID.
        actor_id: String,
        /// Actor type discriminator.
        actor_type: String,
        /// The permission as stored, including any `!` prefix.
        permission: String,
        /// Grant or deny.
        permission_type: PermissionType,
    },

    // ========== Storage ==========
    /// A cached document was reloaded after an external change.
    UserDataReloaded {
        /// Event metadata.
        metadata: EventMetadata,
        /// The reloaded document key.
        key: String,
        /// Reloads seen so far for this key.
        reloads: u64,
    },
}

impl HostEvent {
    /// Get the event metadata.
    #[must_use]
    pub fn metadata(&self) -> &EventMetadata {
        match self {
            Self::RuntimeStarted { metadata, .. }
            | Self::RuntimeStopped { metadata, .. }
            | Self::ServicesResolved { metadata, .. }
            | Self::PermissionAdded { metadata, .. }
            | Self::PermissionRemoved { metadata, .. }
            | Self::UserDataReloaded { metadata, .. } => metadata,
        }
    }

    /// Get the event type name.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RuntimeStarted { .. } => "runtime_started",
            Self::RuntimeStopped { .. } => "runtime_stopped",
            Self::ServicesResolved { .. } => "services_resolved",
            Self::PermissionAdded { .. } => "permission_added",
            Self::PermissionRemoved { .. } => "permission_removed",
            Self::UserDataReloaded { .. } => "user_data_reloaded",
        }
    }

    /// Whether this is a permission change.
    #[must_use]
    pub fn is_permission_event(&self) -> bool {
        matches!(
            self,
            Self::PermissionAdded { .. } | Self::PermissionRemoved { .. }
        )
    }
}
