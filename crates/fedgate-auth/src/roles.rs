//! System role reconciliation.
//!
//! Role claims from the assertion are mapped to local role short-names
//! through a [`RoleMappingTable`]. The resulting [`TargetRoleSet`] is compared
//! with the managed role universe to produce [`RoleOp`]s:
//!
//! - `Assign` for a wanted role the user does not hold yet
//! - `Unassign` for every managed role that is not wanted
//!
//! Unassign is emitted whether or not the role is currently held. The
//! directory only removes assignments made by this integration, so manual
//! assignments of the same role survive.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::LoginResult;
use crate::error::LoginError;
use crate::log_sink::{LogSink, LogSinkExt};
use crate::storage::{DirectoryService, DirectoryUser, RoleDescriptor, SYSTEM_SCOPE};

/// Actor recorded on role assignments made by this integration.
pub const ROLE_ACTOR: &str = "fedgate_auth";

// =============================================================================
// Mapping Table
// =============================================================================

/// Local role short-name to the external role claims that grant it.
///
/// A claim may appear under several short-names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleMappingTable {
    entries: IndexMap<String, Vec<String>>,
}

impl RoleMappingTable {
    /// Creates an empty mapping table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a short-name and the claims that grant it.
    #[must_use]
    pub fn with_role<I, V>(mut self, shortname: impl Into<String>, claims: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.entries
            .insert(shortname.into(), claims.into_iter().map(Into::into).collect());
        self
    }

    /// Iterates over the configured short-names.
    pub fn shortnames(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Returns the claims that grant a short-name.
    #[must_use]
    pub fn claims_for(&self, shortname: &str) -> &[String] {
        self.entries.get(shortname).map(Vec::as_slice).unwrap_or_default()
    }

    /// Iterates over the short-names a single claim grants.
    pub fn roles_for_claim<'a>(&'a self, claim: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(_, claims)| claims.iter().any(|c| c == claim))
            .map(|(shortname, _)| shortname.as_str())
    }

    /// Computes the target role set for a list of claims.
    #[must_use]
    pub fn target_roles(&self, claims: &[String]) -> TargetRoleSet {
        let roles = claims
            .iter()
            .flat_map(|claim| self.roles_for_claim(claim))
            .map(str::to_lowercase)
            .collect();
        TargetRoleSet(roles)
    }

    /// Returns `true` if no short-name is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lower-cased short-names of the roles a principal should hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TargetRoleSet(BTreeSet<String>);

impl TargetRoleSet {
    /// Returns `true` if the role is wanted. Comparison ignores case.
    #[must_use]
    pub fn wants(&self, shortname: &str) -> bool {
        self.0.contains(&shortname.to_lowercase())
    }

    /// Iterates over the wanted short-names.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns the number of wanted roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no role is wanted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// Operations
// =============================================================================

/// A role change to apply to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "role", rename_all = "snake_case")]
pub enum RoleOp {
    /// Assign the role.
    Assign(RoleDescriptor),
    /// Remove the assignment made by this integration.
    Unassign(RoleDescriptor),
}

impl RoleOp {
    /// Returns the role the operation applies to.
    #[must_use]
    pub fn role(&self) -> &RoleDescriptor {
        match self {
            Self::Assign(role) | Self::Unassign(role) => role,
        }
    }

    /// Returns `true` if applying the operation would change `current`.
    #[must_use]
    pub fn is_effective(&self, current: &HashSet<String>) -> bool {
        match self {
            Self::Assign(role) => !current.contains(&role.id),
            Self::Unassign(role) => current.contains(&role.id),
        }
    }
}

impl fmt::Display for RoleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assign(role) => write!(f, "assign {}", role.shortname),
            Self::Unassign(role) => write!(f, "unassign {}", role.shortname),
        }
    }
}

/// Computes the role operations for one login.
///
/// `current` holds the ids of the roles the user holds, `claims` the values
/// of the role claim attribute and `managed` the roles this integration may
/// change. At most one operation is emitted per managed role.
#[must_use]
pub fn reconcile(
    current: &HashSet<String>,
    claims: &[String],
    mapping: &RoleMappingTable,
    managed: &[RoleDescriptor],
) -> Vec<RoleOp> {
    let target = mapping.target_roles(claims);

    managed
        .iter()
        .filter_map(|role| {
            if target.wants(&role.shortname) {
                (!current.contains(&role.id)).then(|| RoleOp::Assign(role.clone()))
            } else {
                Some(RoleOp::Unassign(role.clone()))
            }
        })
        .collect()
}

/// Returns the operations that would change `current`.
#[must_use]
pub fn effective_ops<'a>(ops: &'a [RoleOp], current: &HashSet<String>) -> Vec<&'a RoleOp> {
    ops.iter().filter(|op| op.is_effective(current)).collect()
}

// =============================================================================
// Directory Sync
// =============================================================================

/// Applies role reconciliation to the directory.
pub struct RoleSync<'a> {
    directory: &'a dyn DirectoryService,
    mapping: &'a RoleMappingTable,
    sink: &'a dyn LogSink,
    log_extra_info: bool,
}

impl<'a> RoleSync<'a> {
    /// Creates a role sync over a directory and mapping table.
    #[must_use]
    pub fn new(
        directory: &'a dyn DirectoryService,
        mapping: &'a RoleMappingTable,
        sink: &'a dyn LogSink,
        log_extra_info: bool,
    ) -> Self {
        Self {
            directory,
            mapping,
            sink,
            log_extra_info,
        }
    }

    /// Computes the operations for `user` without applying them.
    ///
    /// # Errors
    ///
    /// Returns `LoginError::DirectoryWriteFailure` if the managed roles or the
    /// current assignments cannot be read.
    pub async fn plan(&self, user: &DirectoryUser, claims: &[String]) -> LoginResult<Vec<RoleOp>> {
        let managed = self
            .directory
            .list_assignable_roles()
            .await
            .map_err(|e| LoginError::directory_write(&user.username, e))?;

        let current: HashSet<String> = self
            .directory
            .role_assignments(&user.id, SYSTEM_SCOPE)
            .await
            .map_err(|e| LoginError::directory_write(&user.username, e))?
            .into_iter()
            .map(|assignment| assignment.role_id)
            .collect();

        let ops = reconcile(&current, claims, self.mapping, &managed);
        debug!(
            username = %user.username,
            managed = managed.len(),
            ops = ops.len(),
            "Planned system role sync"
        );
        Ok(ops)
    }

    /// Applies planned operations in order.
    ///
    /// # Errors
    ///
    /// Returns `LoginError::DirectoryWriteFailure` on the first failed
    /// assignment change.
    pub async fn apply(&self, user: &DirectoryUser, ops: &[RoleOp]) -> LoginResult<()> {
        for op in ops {
            let role = op.role();
            match op {
                RoleOp::Assign(_) => {
                    self.directory
                        .assign_role(&role.id, &user.id, SYSTEM_SCOPE, ROLE_ACTOR)
                        .await
                        .map_err(|e| LoginError::directory_write(&user.username, e))?;
                    if self.log_extra_info {
                        self.sink.info(&format!(
                            "System role {} assigned to {}",
                            role.shortname, user.username
                        ));
                    }
                }
                RoleOp::Unassign(_) => {
                    self.directory
                        .unassign_role(&role.id, &user.id, SYSTEM_SCOPE, ROLE_ACTOR)
                        .await
                        .map_err(|e| LoginError::directory_write(&user.username, e))?;
                    if self.log_extra_info {
                        self.sink.info(&format!(
                            "System role {} unassigned from {}",
                            role.shortname, user.username
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
