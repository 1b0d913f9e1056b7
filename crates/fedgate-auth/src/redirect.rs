//! Post-login redirect resolution.

use std::fmt;

use serde::Serialize;

/// Final destination of a login.
///
/// Never points back at the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RedirectTarget(String);

impl RedirectTarget {
    /// Returns the URL.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the target, returning the URL.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RedirectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves where to send the user after login.
///
/// Precedence is the explicit request parameter, then the URL stashed in the
/// session, then the site root. Blank candidates are skipped. A candidate that
/// contains the login endpoint path is replaced by the site root, or the
/// identity provider would bounce the user into a loop.
#[must_use]
pub fn resolve(
    requested_url: Option<&str>,
    pending_session_url: Option<&str>,
    login_endpoint_path: &str,
    site_root: &str,
) -> RedirectTarget {
    let candidate = [requested_url, pending_session_url]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|url| !url.is_empty())
        .unwrap_or(site_root);

    let endpoint = login_endpoint_path.trim_start_matches('/');
    if !endpoint.is_empty() && candidate.contains(endpoint) {
        return RedirectTarget(site_root.to_string());
    }

    RedirectTarget(candidate.to_string())
}
