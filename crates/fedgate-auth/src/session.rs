//! Session materialization.
//!
//! Turns the directory record of an authorized principal into a
//! [`LoggedInPrincipal`] the host can store in its session.

use serde::Serialize;
use time::OffsetDateTime;
use tracing::debug;

use crate::LoginResult;
use crate::assertion::Assertion;
use crate::error::LoginError;
use crate::hooks::LoginHooks;
use crate::storage::{DirectoryService, DirectoryUser};

/// A principal whose login is complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggedInPrincipal {
    /// Complete directory profile.
    pub user: DirectoryUser,

    /// Always `true` for a materialized principal.
    pub logged_in: bool,

    /// Site the session belongs to.
    pub site: String,

    /// Username the host remembers in its login cookie.
    pub remember_username: String,

    /// When the login completed.
    #[serde(with = "time::serde::rfc3339")]
    pub logged_in_at: OffsetDateTime,
}

/// Completes the login of `user`.
///
/// Fetches the complete profile, marks the principal logged in for `site`,
/// then runs the post-login hook.
///
/// # Errors
///
/// Returns `LoginError::IncompleteProfile` if the directory has no complete
/// profile for the user, or `LoginError::DirectoryWriteFailure` if the
/// lookup itself fails.
pub async fn materialize(
    directory: &dyn DirectoryService,
    user: &DirectoryUser,
    assertion: &Assertion,
    site: &str,
    hooks: &dyn LoginHooks,
) -> LoginResult<LoggedInPrincipal> {
    let profile = directory
        .get_complete_profile(&user.id)
        .await
        .map_err(|e| LoginError::directory_write(&user.username, e))?
        .ok_or_else(|| LoginError::IncompleteProfile {
            username: user.username.clone(),
        })?;

    let principal = LoggedInPrincipal {
        remember_username: profile.username.clone(),
        user: profile,
        logged_in: true,
        site: site.to_string(),
        logged_in_at: OffsetDateTime::now_utc(),
    };
    debug!(username = %principal.user.username, site, "Principal logged in");

    hooks.post_login(&principal, assertion).await;
    Ok(principal)
}
