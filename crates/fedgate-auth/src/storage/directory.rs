//! Directory service trait.
//!
//! Defines the interface for user and role persistence operations the login
//! engine depends on.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Scope identifier of system-level role assignments.
pub const SYSTEM_SCOPE: &str = "system";

/// Result alias for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors reported by a directory implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// The user does not exist.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// A user with the same username already exists.
    #[error("User already exists: {0}")]
    AlreadyExists(String),

    /// The role does not exist.
    #[error("Role not found: {0}")]
    RoleNotFound(String),

    /// The backend failed.
    #[error("Directory backend error: {0}")]
    Backend(String),
}

// =============================================================================
// User Type
// =============================================================================

/// A user record held by the directory.
///
/// Lookups and creation return a partial record; [`DirectoryService::get_complete_profile`]
/// returns the record with `complete` set and the profile fields filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    /// Internal identifier assigned by the directory.
    pub id: String,

    /// Normalized username.
    pub username: String,

    /// Authentication method that owns the account.
    #[serde(default = "default_auth_method")]
    pub auth_method: String,

    /// When the account was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// Profile fields (email, names, ...).
    #[serde(default)]
    pub profile: IndexMap<String, String>,

    /// Whether this record is the complete profile.
    #[serde(default)]
    pub complete: bool,
}

fn default_auth_method() -> String {
    "saml".to_string()
}

impl DirectoryUser {
    /// Creates a new partial user record.
    #[must_use]
    pub fn new(id: impl Into<String>, username: impl Into<String>, created_at: OffsetDateTime) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            auth_method: default_auth_method(),
            created_at,
            profile: IndexMap::new(),
            complete: false,
        }
    }

    /// Sets a profile field.
    #[must_use]
    pub fn with_profile_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.profile.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// Roles
// =============================================================================

/// A role this integration may assign or unassign.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleDescriptor {
    /// Directory identifier of the role.
    pub id: String,

    /// Short name the role mapping table refers to.
    pub shortname: String,

    /// Display name.
    #[serde(default)]
    pub name: String,
}

impl RoleDescriptor {
    /// Creates a role descriptor whose display name equals its short name.
    #[must_use]
    pub fn new(id: impl Into<String>, shortname: impl Into<String>) -> Self {
        let shortname = shortname.into();
        Self {
            id: id.into(),
            name: shortname.clone(),
            shortname,
        }
    }
}

/// A role held by a user in a scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Directory identifier of the role.
    pub role_id: String,

    /// Scope of the assignment.
    pub scope: String,

    /// Component that made the assignment. Empty for manual assignments.
    #[serde(default)]
    pub actor: String,
}

// =============================================================================
// Directory Trait
// =============================================================================

/// Storage operations for users and role assignments.
///
/// The login engine does not serialize logins of the same principal, so
/// implementations must tolerate at-least-once and concurrent calls:
///
/// - `create_user` must fail with [`DirectoryError::AlreadyExists`] rather
///   than create a duplicate.
/// - `assign_role` must be a no-op when the assignment already exists.
/// - `unassign_role` must be a no-op when the assignment is absent, and must
///   only remove assignments made by `actor`.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Find a user by their normalized username.
    ///
    /// Returns `None` if the user doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_user_by_username(&self, username: &str) -> DirectoryResult<Option<DirectoryUser>>;

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::AlreadyExists`] if the username is taken, or
    /// another error if the storage operation fails.
    async fn create_user(
        &self,
        username: &str,
        created_at: OffsetDateTime,
    ) -> DirectoryResult<DirectoryUser>;

    /// Fetch the complete profile of a user.
    ///
    /// Returns `None` if the directory cannot produce one.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get_complete_profile(&self, user_id: &str) -> DirectoryResult<Option<DirectoryUser>>;

    /// List the roles this integration is allowed to manage, in display order.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list_assignable_roles(&self) -> DirectoryResult<Vec<RoleDescriptor>>;

    /// List the role assignments a user holds in a scope, whoever made them.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn role_assignments(
        &self,
        user_id: &str,
        scope: &str,
    ) -> DirectoryResult<Vec<RoleAssignment>>;

    /// Assign a role to a user in a scope on behalf of `actor`.
    ///
    /// # Errors
    ///
    /// Returns an error if the role or user is unknown or the storage
    /// operation fails.
    async fn assign_role(
        &self,
        role_id: &str,
        user_id: &str,
        scope: &str,
        actor: &str,
    ) -> DirectoryResult<()>;

    /// Remove a role assignment previously made by `actor`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn unassign_role(
        &self,
        role_id: &str,
        user_id: &str,
        scope: &str,
        actor: &str,
    ) -> DirectoryResult<()>;
}
