//! Implementation of the DirectoryService trait for InMemoryDirectory.

use async_trait::async_trait;
use time::OffsetDateTime;

use fedgate_auth::storage::DirectoryResult;
use fedgate_auth::{DirectoryError, DirectoryService, DirectoryUser, RoleAssignment, RoleDescriptor};

use crate::storage::InMemoryDirectory;

#[async_trait]
impl DirectoryService for InMemoryDirectory {
    async fn find_user_by_username(&self, username: &str) -> DirectoryResult<Option<DirectoryUser>> {
        Ok(self.user(username))
    }

    async fn create_user(
        &self,
        username: &str,
        created_at: OffsetDateTime,
    ) -> DirectoryResult<DirectoryUser> {
        self.insert_new_user(username, created_at)
    }

    async fn get_complete_profile(&self, user_id: &str) -> DirectoryResult<Option<DirectoryUser>> {
        Ok(self
            .stored_by_id(user_id)
            .filter(|stored| stored.profile_complete)
            .map(|stored| DirectoryUser {
                complete: true,
                ..stored.user
            }))
    }

    async fn list_assignable_roles(&self) -> DirectoryResult<Vec<RoleDescriptor>> {
        Ok(self.roles.read().await.clone())
    }

    async fn role_assignments(
        &self,
        user_id: &str,
        scope: &str,
    ) -> DirectoryResult<Vec<RoleAssignment>> {
        let assignments = self.assignments.read().await;
        Ok(assignments
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
        if self.role(role_id).await.is_none() {
            return Err(DirectoryError::RoleNotFound(role_id.to_string()));
        }
        if self.stored_by_id(user_id).is_none() {
            return Err(DirectoryError::UserNotFound(user_id.to_string()));
        }

        let mut assignments = self.assignments.write().await;
        let list = assignments.entry(user_id.to_string()).or_default();
        let held = list
            .iter()
            .any(|a| a.role_id == role_id && a.scope == scope && a.actor == actor);
        if !held {
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
        let mut assignments = self.assignments.write().await;
        if let Some(list) = assignments.get_mut(user_id) {
            list.retain(|a| !(a.role_id == role_id && a.scope == scope && a.actor == actor));
        }
        Ok(())
    }
}
