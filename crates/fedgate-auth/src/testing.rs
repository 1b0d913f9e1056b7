//! Test doubles shared by the unit tests of this crate.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::storage::{
    DirectoryError, DirectoryResult, DirectoryService, DirectoryUser, RoleAssignment,
    RoleDescriptor,
};

/// Mock directory for testing.
#[derive(Default)]
pub(crate) struct MockDirectory {
    users: RwLock<HashMap<String, DirectoryUser>>,
    roles: RwLock<Vec<RoleDescriptor>>,
    assignments: RwLock<HashMap<String, Vec<RoleAssignment>>>,
    hidden_profiles: RwLock<HashSet<String>>,
    fail_creates: AtomicBool,
    find_calls: AtomicUsize,
    create_calls: AtomicUsize,
}

impl MockDirectory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_roles(self, roles: Vec<RoleDescriptor>) -> Self {
        *self.roles.write().unwrap() = roles;
        self
    }

    pub(crate) fn add_user(&self, username: &str) -> DirectoryUser {
        let id = format!("u-{}", self.users.read().unwrap().len() + 1);
        let user = DirectoryUser::new(id, username, OffsetDateTime::now_utc());
        self.users
            .write()
            .unwrap()
            .insert(username.to_string(), user.clone());
        user
    }

    pub(crate) fn grant(&self, user_id: &str, role_id: &str, actor: &str) {
        self.assignments
            .write()
            .unwrap()
            .entry(user_id.to_string())
            .or_default()
            .push(RoleAssignment {
                role_id: role_id.to_string(),
                scope: crate::storage::SYSTEM_SCOPE.to_string(),
                actor: actor.to_string(),
            });
    }

    /// Returns `(role_id, actor)` pairs held by a user.
    pub(crate) fn assignments_of(&self, user_id: &str) -> Vec<(String, String)> {
        self.assignments
            .read()
            .unwrap()
            .get(user_id)
            .map(|list| {
                list.iter()
                    .map(|a| (a.role_id.clone(), a.actor.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn hide_profile(&self, user_id: &str) {
        self.hidden_profiles
            .write()
            .unwrap()
            .insert(user_id.to_string());
    }

    pub(crate) fn fail_creates(&self) {
        self.fail_creates.store(true, Ordering::SeqCst);
    }

    pub(crate) fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn user(&self, username: &str) -> Option<DirectoryUser> {
        self.users.read().unwrap().get(username).cloned()
    }
}

#[async_trait]
impl DirectoryService for MockDirectory {
    async fn find_user_by_username(&self, username: &str) -> DirectoryResult<Option<DirectoryUser>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.user(username))
    }

    async fn create_user(
        &self,
        username: &str,
        _created_at: OffsetDateTime,
    ) -> DirectoryResult<DirectoryUser> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(DirectoryError::Backend("disk full".to_string()));
        }
        if self.user(username).is_some() {
            return Err(DirectoryError::AlreadyExists(username.to_string()));
        }
        Ok(self.add_user(username))
    }

    async fn get_complete_profile(&self, user_id: &str) -> DirectoryResult<Option<DirectoryUser>> {
        if self.hidden_profiles.read().unwrap().contains(user_id) {
            return Ok(None);
        }
        Ok(self
            .users
            .read()
            .unwrap()
            .values()
            .find(|u| u.id == user_id)
            .cloned()
            .map(|mut user| {
                user.complete = true;
                user
            }))
    }

    async fn list_assignable_roles(&self) -> DirectoryResult<Vec<RoleDescriptor>> {
        Ok(self.roles.read().unwrap().clone())
    }

    async fn role_assignments(
        &self,
        user_id: &str,
        scope: &str,
    ) -> DirectoryResult<Vec<RoleAssignment>> {
        Ok(self
            .assignments
            .read()
            .unwrap()
            .get(user_id)
            .map(|list| list.iter().filter(|a| a.scope == scope).cloned().collect())
            .unwrap_or_default())
    }

    async fn assign_role(
        &self,
        role_id: &str,
        user_id: &str,
        scope: &str,
        actor: &str,
    ) -> DirectoryResult<()> {
        let mut assignments = self.assignments.write().unwrap();
        let list = assignments.entry(user_id.to_string()).or_default();
        let exists = list
            .iter()
            .any(|a| a.role_id == role_id && a.scope == scope && a.actor == actor);
        if !exists {
            list.push(RoleAssignment {
                role_id: role_id.to_string(),
                scope: scope.to_string(),
                actor: actor.to_string(),
            });
        }
        Ok(())
    }

    async fn unassign_role(
        &self,
        role_id: &str,
        user_id: &str,
        scope: &str,
        actor: &str,
    ) -> DirectoryResult<()> {
        if let Some(list) = self.assignments.write().unwrap().get_mut(user_id) {
            list.retain(|a| !(a.role_id == role_id && a.scope == scope && a.actor == actor));
        }
        Ok(())
    }
}
