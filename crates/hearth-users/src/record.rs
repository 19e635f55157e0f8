//! User records and the users document.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use hearth_storage::Document;
use serde::{Deserialize, Serialize};

use crate::value::DataValue;

/// Storage key of the users document.
pub const USERS_KEY: &str = "users";

/// Actor type discriminators known to the host.
pub mod actor_type {
    /// Remote console connections.
    pub const RCON: &str = "rcon";
    /// The local server console.
    pub const CONSOLE: &str = "console";
    /// Connected players.
    pub const PLAYER: &str = "player";
}

/// Case-insensitive string equality, Unicode aware.
pub(crate) fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// One actor's persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    /// Actor ID.
    pub id: String,
    /// Actor type discriminator, see [`actor_type`].
    #[serde(rename = "type")]
    pub user_type: String,
    /// When the actor was first seen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<DateTime<Utc>>,
    /// When the actor was last seen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    /// Display name at the last visit.
    #[serde(default)]
    pub last_display_name: String,
    /// Granted (`perm`) and denied (`!perm`) permissions.
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    /// Role IDs.
    #[serde(default)]
    pub roles: BTreeSet<String>,
    /// Free-form fields.
    #[serde(default)]
    pub data: BTreeMap<String, DataValue>,
}

impl UserData {
    /// An empty record for `(id, user_type)`.
    #[must_use]
    pub fn new(id: impl Into<String>, user_type: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            last_display_name: id.clone(),
            id,
            user_type: user_type.into(),
            first_seen: None,
            last_seen: None,
            permissions: BTreeSet::new(),
            roles: BTreeSet::new(),
            data: BTreeMap::new(),
        }
    }

    /// A record for an actor seen for the first time right now.
    #[must_use]
    pub fn first_seen_now(id: impl Into<String>, user_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            first_seen: Some(now),
            last_seen: Some(now),
            ..Self::new(id, user_type)
        }
    }

    /// The built-in `root` remote console user with every permission.
    #[must_use]
    pub fn root() -> Self {
        let mut root = Self::new("root", actor_type::RCON);
        root.permissions.insert("*".to_owned());
        root
    }

    /// Whether this record belongs to `(id, user_type)`, ignoring case.
    #[must_use]
    pub fn is(&self, id: &str, user_type: &str) -> bool {
        eq_ignore_case(&self.id, id) && eq_ignore_case(&self.user_type, user_type)
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.last_display_name = name.into();
        self
    }

    /// Add a permission.
    #[must_use]
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    /// Add a role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Set a data field.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: DataValue) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

/// Every user record, persisted under [`USERS_KEY`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UsersData {
    /// Records in insertion order. A missing or null list reads as the
    /// seeded default.
    #[serde(default = "default_users", deserialize_with = "users_or_default")]
    pub users: Vec<UserData>,
}

fn default_users() -> Vec<UserData> {
    vec![UserData::root()]
}

fn users_or_default<'de, D>(deserializer: D) -> Result<Vec<UserData>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<UserData>>::deserialize(deserializer)?.unwrap_or_else(default_users))
}

impl UsersData {
    /// The record for `(id, user_type)`.
    #[must_use]
    pub fn find(&self, id: &str, user_type: &str) -> Option<&UserData> {
        self.users.iter().find(|u| u.is(id, user_type))
    }

    /// Mutable access to the record for `(id, user_type)`.
    pub fn find_mut(&mut self, id: &str, user_type: &str) -> Option<&mut UserData> {
        self.users.iter_mut().find(|u| u.is(id, user_type))
    }

    /// Records whose type matches `user_type`, ignoring case.
    pub fn of_type<'a>(&'a self, user_type: &'a str) -> impl Iterator<Item = &'a UserData> {
        self.users
            .iter()
            .filter(move |u| eq_ignore_case(&u.user_type, user_type))
    }

    /// Insert or replace the record with `record`'s identity.
    ///
    /// A replaced record keeps its position; duplicates of the identity are
    /// dropped. New identities are appended. Returns the record's index.
    pub fn upsert(&mut self, record: UserData) -> usize {
        let existing = self
            .users
            .iter()
            .position(|u| u.is(&record.id, &record.user_type));
        self.users.retain(|u| !u.is(&record.id, &record.user_type));

        match existing {
            Some(index) => {
                // Earlier entries never match, so `index` is still valid.
                self.users.insert(index, record);
                index
            },
            None => {
                self.users.push(record);
                self.users.len().saturating_sub(1)
            },
        }
    }
}

impl Document for UsersData {
    fn seed() -> Self {
        Self {
            users: default_users(),
        }
    }
}
