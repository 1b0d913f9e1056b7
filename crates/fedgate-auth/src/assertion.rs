//! Identity assertions and attribute extraction.
//!
//! An [`Assertion`] is the attribute bag vouched for by the identity provider
//! for one login attempt. Attribute values are kept in the order the provider
//! sent them; the first value of an attribute is the one used for single-valued
//! lookups such as the username.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::LoginResult;
use crate::error::LoginError;

/// Attribute name used for usernames when none is configured.
pub const DEFAULT_USERNAME_ATTRIBUTE: &str = "eduPersonPrincipalName";

/// Attribute bag of one login attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Assertion {
    attributes: IndexMap<String, Vec<String>>,
}

impl Assertion {
    /// Creates an empty assertion.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute with its values.
    #[must_use]
    pub fn with_attribute<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.insert(name, values);
        self
    }

    /// Sets the values of an attribute, replacing existing ones.
    pub fn insert<I, V>(&mut self, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.attributes
            .insert(name.into(), values.into_iter().map(Into::into).collect());
    }

    /// Removes an attribute, returning its values.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.attributes.shift_remove(name)
    }

    /// Returns the values of an attribute.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.attributes.get(name).map(Vec::as_slice)
    }

    /// Returns `true` if the attribute is present, even with no values.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Returns the first value of an attribute.
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Iterates over attribute names and values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.attributes
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Returns the number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns `true` if the assertion carries no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl<K, V> FromIterator<(K, Vec<V>)> for Assertion
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, Vec<V>)>>(iter: T) -> Self {
        let mut assertion = Self::new();
        for (name, values) in iter {
            assertion.insert(name, values);
        }
        assertion
    }
}

/// How an extracted attribute value is normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// Identifiers are trimmed and lower-cased.
    Identifier,
    /// Plain values are only trimmed.
    Value,
}

/// Extracts the first value of a required attribute.
///
/// # Errors
///
/// Returns [`LoginError::MissingAttribute`] if the attribute is absent or has
/// no values.
pub fn extract(assertion: &Assertion, attribute: &str, kind: AttributeKind) -> LoginResult<String> {
    let value = assertion
        .first(attribute)
        .ok_or_else(|| LoginError::missing_attribute(attribute))?;

    let value = value.trim();
    Ok(match kind {
        AttributeKind::Identifier => value.to_lowercase(),
        AttributeKind::Value => value.to_string(),
    })
}

/// Normalized username of the principal logging in.
///
/// Always non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PrincipalIdentity(String);

impl PrincipalIdentity {
    /// Derives the principal identity from the configured username attribute.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::MissingAttribute`] if the attribute is absent,
    /// has no values, or its first value is blank.
    pub fn from_assertion(assertion: &Assertion, attribute: &str) -> LoginResult<Self> {
        let username = extract(assertion, attribute, AttributeKind::Identifier)?;
        if username.is_empty() {
            return Err(LoginError::missing_attribute(attribute));
        }
        Ok(Self(username))
    }

    /// Returns the username.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PrincipalIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
