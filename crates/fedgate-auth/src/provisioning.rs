//! Just-in-time provisioning.
//!
//! [`authorize_provisioning`] decides whether an unknown principal may be
//! created at all; it runs before course mapping and before any directory
//! write. [`provision_user`] then finds or creates the directory record once
//! authorization has passed.

use std::fmt;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::LoginResult;
use crate::assertion::PrincipalIdentity;
use crate::error::LoginError;
use crate::storage::{DirectoryError, DirectoryService, DirectoryUser};

/// Checks whether the principal may proceed towards provisioning.
///
/// Existing principals are never blocked here.
///
/// # Errors
///
/// Returns `LoginError::JitDisabled` if the principal does not exist and
/// just-in-time provisioning is disabled.
pub fn authorize_provisioning(
    existing_user: bool,
    disable_jit: bool,
    username: &PrincipalIdentity,
) -> LoginResult<()> {
    if !existing_user && disable_jit {
        debug!(%username, "Unknown user refused: just-in-time provisioning disabled");
        return Err(LoginError::jit_disabled(username.as_str()));
    }
    Ok(())
}

/// Result of user provisioning.
#[derive(Debug, Clone)]
pub struct ProvisioningResult {
    /// The found or created user.
    pub user: DirectoryUser,

    /// The action that was taken.
    pub action: ProvisioningAction,
}

/// The action taken during provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningAction {
    /// The user already existed.
    Existing,

    /// A new user was created.
    Created,
}

impl ProvisioningAction {
    /// Returns `true` if a new user was created.
    #[must_use]
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created)
    }
}

impl fmt::Display for ProvisioningAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Existing => write!(f, "existing"),
            Self::Created => write!(f, "created"),
        }
    }
}

/// Finds or creates the directory record of an authorized principal.
///
/// `found` is the record looked up earlier in the pipeline, if any. A create
/// that loses a race against a concurrent login of the same principal falls
/// back to the record the other login created.
///
/// # Errors
///
/// Returns `LoginError::DirectoryWriteFailure` if the record can be neither
/// created nor found.
pub async fn provision_user(
    directory: &dyn DirectoryService,
    username: &PrincipalIdentity,
    found: Option<DirectoryUser>,
    now: OffsetDateTime,
) -> LoginResult<ProvisioningResult> {
    if let Some(user) = found {
        return Ok(ProvisioningResult {
            user,
            action: ProvisioningAction::Existing,
        });
    }

    match directory.create_user(username.as_str(), now).await {
        Ok(user) => {
            info!(%username, user_id = %user.id, "Provisioned new user");
            Ok(ProvisioningResult {
                user,
                action: ProvisioningAction::Created,
            })
        }
        Err(DirectoryError::AlreadyExists(_)) => {
            debug!(%username, "User created concurrently, reusing existing record");
            let user = directory
                .find_user_by_username(username.as_str())
                .await
                .map_err(|e| LoginError::directory_write(username.as_str(), e))?
                .ok_or_else(|| {
                    LoginError::directory_write(
                        username.as_str(),
                        DirectoryError::UserNotFound(username.to_string()),
                    )
                })?;
            Ok(ProvisioningResult {
                user,
                action: ProvisioningAction::Existing,
            })
        }
        Err(e) => Err(LoginError::directory_write(username.as_str(), e)),
    }
}
