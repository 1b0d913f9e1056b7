use std::collections::HashMap;

use fedgate_auth::{DirectoryError, DirectoryUser, RoleAssignment, RoleDescriptor};
use papaya::HashMap as PapayaHashMap;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;

/// A user record together with its profile state.
#[derive(Debug, Clone)]
pub(crate) struct StoredUser {
    pub(crate) user: DirectoryUser,
    /// Whether the directory can produce a complete profile for this user.
    pub(crate) profile_complete: bool,
}

/// Key of a new user record that another record already holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum KeyTaken {
    Id(String),
    Username(String),
}

/// In-memory directory backend.
///
/// - Users are keyed by username in a papaya::HashMap; creation is an atomic
///   insert-if-absent on both the id index and the username, so two
///   concurrent creates of one username yield one record and one
///   `AlreadyExists`, and no id ever resolves to two users.
/// - Role assignments sit behind a tokio RwLock, keyed by user id.
#[derive(Debug)]
pub struct InMemoryDirectory {
    pub(crate) users: PapayaHashMap<String, StoredUser>,
    /// User id -> username
    pub(crate) usernames: PapayaHashMap<String, String>,
    pub(crate) roles: RwLock<Vec<RoleDescriptor>>,
    pub(crate) assignments: RwLock<HashMap<String, Vec<RoleAssignment>>>,
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self {
            users: PapayaHashMap::new(),
            usernames: PapayaHashMap::new(),
            roles: RwLock::new(Vec::new()),
            assignments: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a directory managing the given roles.
    pub fn with_roles(roles: Vec<RoleDescriptor>) -> Self {
        Self {
            roles: RwLock::new(roles),
            ..Self::new()
        }
    }

    /// Inserts a user record unless its id or username is taken.
    pub(crate) fn insert_user(
        &self,
        user: DirectoryUser,
        profile_complete: bool,
    ) -> Result<DirectoryUser, KeyTaken> {
        let username = user.username.clone();
        let id = user.id.clone();
        let stored = StoredUser {
            user: user.clone(),
            profile_complete,
        };

        // The id must resolve before the record becomes visible by username.
        if self.usernames.pin().try_insert(id.clone(), username.clone()).is_err() {
            return Err(KeyTaken::Id(id));
        }
        if self.users.pin().try_insert(username.clone(), stored).is_err() {
            self.usernames.pin().remove(&id);
            return Err(KeyTaken::Username(username));
        }
        Ok(user)
    }

    /// Creates a user with a fresh id.
    pub(crate) fn insert_new_user(
        &self,
        username: &str,
        created_at: OffsetDateTime,
    ) -> Result<DirectoryUser, DirectoryError> {
        let user = DirectoryUser::new(uuid::Uuid::new_v4().to_string(), username, created_at);
        let user = self
            .insert_user(user, true)
            .map_err(|_| DirectoryError::AlreadyExists(username.to_string()))?;
        debug!(username, user_id = %user.id, "Created directory user");
        Ok(user)
    }

    /// Looks a user record up by username.
    pub fn user(&self, username: &str) -> Option<DirectoryUser> {
        self.users.pin().get(username).map(|stored| stored.user.clone())
    }

    /// Looks a stored record up by user id.
    pub(crate) fn stored_by_id(&self, user_id: &str) -> Option<StoredUser> {
        let username = self.usernames.pin().get(user_id).cloned()?;
        self.users.pin().get(&username).cloned()
    }

    /// Returns the number of users.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Adds a role to the set this integration manages.
    pub async fn add_role(&self, role: RoleDescriptor) {
        let mut roles = self.roles.write().await;
        if !roles.iter().any(|r| r.id == role.id) {
            roles.push(role);
        }
    }

    /// Looks a managed role up by id.
    pub async fn role(&self, role_id: &str) -> Option<RoleDescriptor> {
        self.roles
            .read()
            .await
            .iter()
            .find(|r| r.id == role_id)
            .cloned()
    }

    /// Returns every assignment a user holds, in any scope.
    pub async fn assignments_for(&self, user_id: &str) -> Vec<RoleAssignment> {
        self.assignments
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns all users, sorted by username.
    pub fn users(&self) -> Vec<DirectoryUser> {
        let guard = self.users.pin();
        let mut users: Vec<DirectoryUser> = guard.values().map(|s| s.user.clone()).collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }
}
