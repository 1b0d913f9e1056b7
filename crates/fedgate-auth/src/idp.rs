//! Identity provider client interface.
//!
//! The protocol handshake is delegated to an [`IdentityProvider`]
//! implementation; the engine only consumes its verdict and attributes.
//! [`StaticIdentityProvider`] serves a fixed assertion and is used by the CLI
//! and tests.

use async_trait::async_trait;
use url::Url;

use crate::assertion::Assertion;

/// Errors reported by the identity provider client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdpError {
    /// The provider session could not be read.
    #[error("Identity provider session error: {0}")]
    Session(String),

    /// The provider could not be reached.
    #[error("Identity provider unreachable: {0}")]
    Unreachable(String),

    /// The provider client is misconfigured.
    #[error("Identity provider configuration error: {0}")]
    Configuration(String),
}

/// Result of asking the provider to authenticate the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// A valid provider session exists.
    AlreadyAuthenticated(Assertion),
    /// The user must be sent to the provider.
    RedirectIssued {
        /// Where to send the user.
        location: String,
    },
}

/// Client of the external identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns `true` if the current request carries a valid provider session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be inspected.
    async fn is_authenticated(&self) -> Result<bool, IdpError>;

    /// Returns the attributes of the current provider session.
    ///
    /// # Errors
    ///
    /// Returns an error if no attributes are available.
    async fn attributes(&self) -> Result<Assertion, IdpError>;

    /// Ensures the request is authenticated, or tells where to send the user.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot start authentication.
    async fn require_auth(&self) -> Result<AuthState, IdpError>;

    /// Ends the provider session and returns where to send the user.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot start logout.
    async fn logout(&self, return_url: &str) -> Result<String, IdpError>;
}

/// Identity provider serving a fixed assertion.
#[derive(Debug, Clone)]
pub struct StaticIdentityProvider {
    assertion: Option<Assertion>,
    sso_url: Url,
    slo_url: Url,
}

impl StaticIdentityProvider {
    /// Creates a provider with an authenticated session.
    #[must_use]
    pub fn authenticated(assertion: Assertion, sso_url: Url, slo_url: Url) -> Self {
        Self {
            assertion: Some(assertion),
            sso_url,
            slo_url,
        }
    }

    /// Creates a provider without a session.
    #[must_use]
    pub fn anonymous(sso_url: Url, slo_url: Url) -> Self {
        Self {
            assertion: None,
            sso_url,
            slo_url,
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn is_authenticated(&self) -> Result<bool, IdpError> {
        Ok(self.assertion.is_some())
    }

    async fn attributes(&self) -> Result<Assertion, IdpError> {
        self.assertion
            .clone()
            .ok_or_else(|| IdpError::Session("no authenticated session".to_string()))
    }

    async fn require_auth(&self) -> Result<AuthState, IdpError> {
        Ok(match &self.assertion {
            Some(assertion) => AuthState::AlreadyAuthenticated(assertion.clone()),
            None => AuthState::RedirectIssued {
                location: self.sso_url.to_string(),
            },
        })
    }

    async fn logout(&self, return_url: &str) -> Result<String, IdpError> {
        let mut location = self.slo_url.clone();
        location
            .query_pairs_mut()
            .append_pair("ReturnTo", return_url);
        Ok(location.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls() -> (Url, Url) {
        (
            Url::parse("https://idp.example.org/sso").unwrap(),
            Url::parse("https://idp.example.org/slo").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_authenticated_provider() {
        let (sso, slo) = urls();
        let assertion = Assertion::new().with_attribute("uid", ["alice"]);
        let idp = StaticIdentityProvider::authenticated(assertion.clone(), sso, slo);

        assert!(idp.is_authenticated().await.unwrap());
        assert_eq!(idp.attributes().await.unwrap(), assertion);
        assert_eq!(
            idp.require_auth().await.unwrap(),
            AuthState::AlreadyAuthenticated(assertion)
        );
    }

    #[tokio::test]
    async fn test_anonymous_provider_redirects() {
        let (sso, slo) = urls();
        let idp = StaticIdentityProvider::anonymous(sso, slo);

        assert!(!idp.is_authenticated().await.unwrap());
        assert!(matches!(idp.attributes().await, Err(IdpError::Session(_))));
        assert_eq!(
            idp.require_auth().await.unwrap(),
            AuthState::RedirectIssued {
                location: "https://idp.example.org/sso".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_logout_carries_return_url() {
        let (sso, slo) = urls();
        let idp = StaticIdentityProvider::anonymous(sso, slo);

        let location = idp.logout("https://learn.example.org/").await.unwrap();
        assert_eq!(
            location,
            "https://idp.example.org/slo?ReturnTo=https%3A%2F%2Flearn.example.org%2F"
        );
    }
}
