//! Directory fixtures.
//!
//! A fixture is a JSON document describing the managed roles and the users a
//! directory starts with. [`InMemoryDirectory::snapshot`] produces the same
//! shape, so a directory can be saved after a login and reloaded.
//!
//! ```json
//! {
//!   "roles": [{ "id": "r-student", "shortname": "student" }],
//!   "users": [{
//!     "username": "alice",
//!     "profile": { "email": "alice@example.org" },
//!     "assignments": [{ "role": "r-student", "actor": "fedgate_auth" }]
//!   }]
//! }
//! ```

use std::path::{Path, PathBuf};

use fedgate_auth::{DirectoryUser, RoleAssignment, RoleDescriptor, SYSTEM_SCOPE};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use crate::storage::{InMemoryDirectory, KeyTaken};

/// Errors raised while loading a fixture.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("Failed to read directory fixture {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid directory fixture: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("User '{username}' is listed twice")]
    DuplicateUser { username: String },

    #[error("User id '{id}' of '{username}' is already used by another user")]
    DuplicateId { id: String, username: String },

    #[error("User '{username}' holds unknown role '{role}'")]
    UnknownRole { username: String, role: String },
}

/// Initial content of a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryFixture {
    /// Roles the login engine may manage.
    #[serde(default)]
    pub roles: Vec<RoleDescriptor>,
    /// Existing users.
    #[serde(default)]
    pub users: Vec<FixtureUser>,
}

/// A user of a fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureUser {
    /// Directory id. Generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub username: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub profile: IndexMap<String, String>,
    /// Set to `false` to simulate a user whose profile cannot be completed.
    #[serde(default = "default_true")]
    pub profile_complete: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignments: Vec<FixtureAssignment>,
}

/// A role assignment of a fixture user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureAssignment {
    /// Role id.
    pub role: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Empty for manual assignments.
    #[serde(default)]
    pub actor: String,
}

fn default_true() -> bool {
    true
}

fn default_scope() -> String {
    SYSTEM_SCOPE.to_string()
}

impl DirectoryFixture {
    /// Parses a JSON fixture.
    pub fn from_json_str(content: &str) -> Result<Self, FixtureError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Reads a JSON fixture file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }
}

impl InMemoryDirectory {
    /// Builds a directory from a fixture.
    pub fn from_fixture(fixture: DirectoryFixture) -> Result<Self, FixtureError> {
        let mut directory = Self::with_roles(fixture.roles.clone());
        let now = OffsetDateTime::now_utc();

        let mut assignments = std::collections::HashMap::new();
        for entry in fixture.users {
            for assignment in &entry.assignments {
                if !fixture.roles.iter().any(|r| r.id == assignment.role) {
                    return Err(FixtureError::UnknownRole {
                        username: entry.username,
                        role: assignment.role.clone(),
                    });
                }
            }

            let id = entry
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let mut user = DirectoryUser::new(id, entry.username.clone(), now);
            user.profile = entry.profile;
            let user = directory
                .insert_user(user, entry.profile_complete)
                .map_err(|taken| match taken {
                    KeyTaken::Id(id) => FixtureError::DuplicateId {
                        id,
                        username: entry.username,
                    },
                    KeyTaken::Username(username) => FixtureError::DuplicateUser { username },
                })?;

            let held: Vec<RoleAssignment> = entry
                .assignments
                .into_iter()
                .map(|a| RoleAssignment {
                    role_id: a.role,
                    scope: a.scope,
                    actor: a.actor,
                })
                .collect();
            assignments.insert(user.id, held);
        }

        *directory.assignments.get_mut() = assignments;
        info!(
            users = directory.user_count(),
            roles = fixture.roles.len(),
            "Loaded directory fixture"
        );
        Ok(directory)
    }

    /// Reads a JSON fixture file and builds a directory from it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        Self::from_fixture(DirectoryFixture::load(path)?)
    }

    /// Captures the current content in fixture form.
    pub async fn snapshot(&self) -> DirectoryFixture {
        let roles = self.roles.read().await.clone();
        let users = self.users();
        let assignments = self.assignments.read().await;

        let users = users
            .into_iter()
            .map(|user| {
                let profile_complete = self
                    .stored_by_id(&user.id)
                    .is_none_or(|stored| stored.profile_complete);
                FixtureUser {
                    assignments: assignments
                        .get(&user.id)
                        .map(|held| {
                            held.iter()
                                .map(|a| FixtureAssignment {
                                    role: a.role_id.clone(),
                                    scope: a.scope.clone(),
                                    actor: a.actor.clone(),
                                })
                                .collect()
                        })
                        .unwrap_or_default(),
                    id: Some(user.id),
                    username: user.username,
                    profile: user.profile,
                    profile_complete,
                }
            })
            .collect();

        DirectoryFixture { roles, users }
    }
}
