//! Login extension hooks.
//!
//! Deployments customize the pipeline by implementing [`LoginHooks`]. Every
//! method has a default that leaves the pipeline's own decision untouched,
//! so an implementation only overrides the hook points it cares about.
//! Hook sets are registered by name in a [`HookRegistry`] and selected by the
//! `hooks` configuration option.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::assertion::{Assertion, PrincipalIdentity};
use crate::config::ConfigError;
use crate::session::LoggedInPrincipal;

/// Answer of the authorize hook.
///
/// [`HookVerdict::Abstain`] is what the default `authorize_user` returns and
/// stands for "no authorization hook". An implementation that overrides
/// `authorize_user` must answer [`HookVerdict::Approved`] or
/// [`HookVerdict::Denied`]; anything short of approval is a denial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookVerdict {
    /// No authorization hook: keep the verdict of the built-in checks.
    ///
    /// Only the default `authorize_user` returns this.
    Abstain,
    /// Authorize the login, overriding the built-in checks.
    Approved,
    /// Deny the login with a reason shown to the user.
    Denied(String),
}

/// Extension points of the login pipeline.
#[async_trait]
pub trait LoginHooks: Send + Sync {
    /// Rewrites the assertion before any attribute is read.
    async fn filter_attributes(&self, _assertion: &mut Assertion) {}

    /// Narrows the directory's answer to "does this user exist".
    ///
    /// The pipeline combines the result with `exists` using a logical AND,
    /// so a hook can hide an existing user but never invent one.
    async fn user_exists(
        &self,
        _username: &PrincipalIdentity,
        _assertion: &Assertion,
        exists: bool,
    ) -> bool {
        exists
    }

    /// Has the final say on authorization.
    ///
    /// `authorized` is the verdict of the built-in checks. Overriding
    /// implementations answer `Approved` to let the login through, even
    /// against the built-in checks, or `Denied` with the reason shown to the
    /// user. The default abstains, leaving the built-in verdict in place.
    async fn authorize_user(
        &self,
        _username: &PrincipalIdentity,
        _assertion: &Assertion,
        _authorized: bool,
    ) -> HookVerdict {
        HookVerdict::Abstain
    }

    /// Runs after the principal is logged in. Cannot affect the login.
    async fn post_login(&self, _principal: &LoggedInPrincipal, _assertion: &Assertion) {}
}

/// Hooks that change nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl LoginHooks for NoopHooks {}

/// Named hook sets.
#[derive(Default, Clone)]
pub struct HookRegistry {
    hooks: IndexMap<String, Arc<dyn LoginHooks>>,
}

impl HookRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hook set under a name, replacing any previous one.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, hooks: Arc<dyn LoginHooks>) -> Self {
        self.register(name, hooks);
        self
    }

    /// Registers a hook set under a name, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, hooks: Arc<dyn LoginHooks>) {
        self.hooks.insert(name.into(), hooks);
    }

    /// Resolves the configured hook set.
    ///
    /// No name yields [`NoopHooks`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownHooks` if the name is not registered.
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn LoginHooks>, ConfigError> {
        match name {
            None => Ok(Arc::new(NoopHooks)),
            Some(name) => self
                .hooks
                .get(name)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownHooks(name.to_string())),
        }
    }

    /// Iterates over registered names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hooks.keys().map(String::as_str)
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}
