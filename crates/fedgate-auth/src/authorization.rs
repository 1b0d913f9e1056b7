//! Login authorization.
//!
//! The built-in rule refuses unknown principals when course enrollment is in
//! use and none of their mapped courses is active. The authorize hook then
//! has the final say: it can deny a login the rule allowed, or approve one it
//! denied.

use serde::Serialize;
use tracing::debug;

use crate::LoginResult;
use crate::assertion::{Assertion, PrincipalIdentity};
use crate::error::LoginError;
use crate::hooks::{HookVerdict, LoginHooks};

/// Outcome of the authorization gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum AuthorizationVerdict {
    /// The login may proceed.
    Authorized,
    /// Unknown principal without an active mapped course.
    DeniedNoCourseMatch,
    /// Refused by the authorize hook.
    DeniedByHook {
        /// Reason supplied by the hook.
        reason: String,
    },
}

impl AuthorizationVerdict {
    /// Returns `true` if the login may proceed.
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized)
    }

    /// Turns a denial into the error that terminates the login.
    ///
    /// # Errors
    ///
    /// Returns `LoginError::NoMappedCourseActive` or
    /// `LoginError::DeniedByHook` for the respective denials.
    pub fn into_result(self, username: &PrincipalIdentity) -> LoginResult<()> {
        match self {
            Self::Authorized => Ok(()),
            Self::DeniedNoCourseMatch => Err(LoginError::NoMappedCourseActive {
                username: username.to_string(),
            }),
            Self::DeniedByHook { reason } => Err(LoginError::DeniedByHook {
                username: username.to_string(),
                reason,
            }),
        }
    }
}

/// Decides whether the principal may log in.
///
/// `any_course_active` is `None` when course enrollment is not in use.
pub async fn authorize(
    username: &PrincipalIdentity,
    assertion: &Assertion,
    existing_user: bool,
    any_course_active: Option<bool>,
    hooks: &dyn LoginHooks,
) -> AuthorizationVerdict {
    let mut verdict = AuthorizationVerdict::Authorized;

    if !existing_user && any_course_active == Some(false) {
        verdict = AuthorizationVerdict::DeniedNoCourseMatch;
    }

    match hooks
        .authorize_user(username, assertion, verdict.is_authorized())
        .await
    {
        HookVerdict::Abstain => {}
        HookVerdict::Approved => verdict = AuthorizationVerdict::Authorized,
        HookVerdict::Denied(reason) => verdict = AuthorizationVerdict::DeniedByHook { reason },
    }

    debug!(%username, ?verdict, "Authorization decided");
    verdict
}
