//! Login engine configuration.
//!
//! [`LoginConfig`] enumerates every option the engine recognizes. It is
//! loaded from TOML and validated once before a pipeline is built.
//!
//! # Example (TOML)
//!
//! ```toml
//! username_attribute = "eduPersonPrincipalName"
//! disable_jit = false
//! role_attribute = "eduPersonAffiliation"
//! course_support = "internal"
//! course_attribute = "schacUserStatus"
//! site_root = "https://learn.example.org"
//!
//! [role_mapping]
//! editingteacher = ["staff", "faculty"]
//! student = ["student"]
//!
//! [courses.mapping.math101]
//! course = "MATH-101"
//! active = true
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ErrorCategory;
use crate::roles::RoleMappingTable;

/// Root configuration of the login engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginConfig {
    /// Assertion attribute holding the username.
    pub username_attribute: String,

    /// Refuse logins of principals that do not exist in the directory.
    pub disable_jit: bool,

    /// Assertion attribute holding the role claims.
    pub role_attribute: String,

    /// Course enrollment mode.
    pub course_support: CourseSupport,

    /// Assertion attribute holding the course claims.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_attribute: Option<String>,

    /// Local role short-name to external role claims.
    #[serde(default)]
    pub role_mapping: RoleMappingTable,

    /// Course mapping table.
    #[serde(default)]
    pub courses: CourseTableConfig,

    /// Write successful logins and role changes to the log sink.
    #[serde(default)]
    pub log_extra_info: bool,

    /// Send suppressible errors to the log sink instead of the user.
    #[serde(default)]
    pub dont_display_to_user: bool,

    /// Error categories that `dont_display_to_user` applies to.
    #[serde(default = "default_suppressed_categories")]
    pub suppressed_categories: Vec<ErrorCategory>,

    /// Log sink file. Logs go to `tracing` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// Propagate logout to the identity provider.
    #[serde(default)]
    pub single_logout: bool,

    /// Public base URL of the site.
    #[serde(default = "default_site_root")]
    pub site_root: String,

    /// Path of the login endpoint, relative to the site root.
    #[serde(default = "default_login_endpoint_path")]
    pub login_endpoint_path: String,

    /// Path of the page errors raised before login redirect to.
    #[serde(default = "default_login_page_path")]
    pub login_page_path: String,

    /// Name of the registered hook set to use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hooks: Option<String>,
}

fn default_suppressed_categories() -> Vec<ErrorCategory> {
    vec![ErrorCategory::CourseEnrollment]
}

fn default_site_root() -> String {
    "http://localhost/".to_string()
}

fn default_login_endpoint_path() -> String {
    "auth/fedgate/index".to_string()
}

fn default_login_page_path() -> String {
    "auth/fedgate/login".to_string()
}

/// Course enrollment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseSupport {
    /// Courses are ignored.
    #[default]
    NoSupport,
    /// Courses are mapped through the configured course table.
    Internal,
    /// Courses are mapped by an external course mapper.
    External,
}

impl CourseSupport {
    /// Returns `true` if course-based enrollment is in use.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::NoSupport)
    }
}

/// Course mapping table configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CourseTableConfig {
    /// Separator between the course id and the role claim in a course claim.
    pub separator: String,

    /// Local course role used when a claim carries no role.
    pub default_role: String,

    /// External course id to local course.
    pub mapping: IndexMap<String, CourseEntry>,
}

impl Default for CourseTableConfig {
    fn default() -> Self {
        Self {
            separator: ":".to_string(),
            default_role: "student".to_string(),
            mapping: IndexMap::new(),
        }
    }
}

/// A local course an external course id maps to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CourseEntry {
    /// Local course short-name.
    pub course: String,

    /// Whether the course currently accepts enrollments.
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// The configured hook set is not registered.
    #[error("Unknown hook set: {0}")]
    UnknownHooks(String),

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration file could not be read.
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        /// The configuration file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl LoginConfig {
    /// Creates a configuration with the required fields and defaults for
    /// everything else.
    #[must_use]
    pub fn new(
        username_attribute: impl Into<String>,
        role_attribute: impl Into<String>,
        disable_jit: bool,
        course_support: CourseSupport,
    ) -> Self {
        Self {
            username_attribute: username_attribute.into(),
            disable_jit,
            role_attribute: role_attribute.into(),
            course_support,
            course_attribute: None,
            role_mapping: RoleMappingTable::default(),
            courses: CourseTableConfig::default(),
            log_extra_info: false,
            dont_display_to_user: false,
            suppressed_categories: default_suppressed_categories(),
            log_file: None,
            single_logout: false,
            site_root: default_site_root(),
            login_endpoint_path: default_login_endpoint_path(),
            login_page_path: default_login_page_path(),
            hooks: None,
        }
    }

    /// Parses and validates a TOML configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` if a required field is missing or a value
    /// has the wrong type, or any error from [`LoginConfig::validate`].
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read, or any error from
    /// [`LoginConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if:
    /// - The username or role attribute is empty
    /// - Course support is enabled without a course attribute
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The site root is not an absolute http(s) URL
    /// - The login endpoint path is empty
    /// - Two role mapping short-names differ only by case
    /// - The course claim separator is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.username_attribute.trim().is_empty() {
            return Err(ConfigError::Missing("username_attribute".to_string()));
        }

        if self.role_attribute.trim().is_empty() {
            return Err(ConfigError::Missing("role_attribute".to_string()));
        }

        if self.course_support.is_enabled()
            && self
                .course_attribute
                .as_deref()
                .is_none_or(|attr| attr.trim().is_empty())
        {
            return Err(ConfigError::Missing(
                "course_attribute (required when course_support is enabled)".to_string(),
            ));
        }

        match Url::parse(&self.site_root) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ConfigError::InvalidValue(format!(
                    "site_root must use http or https, got '{}'",
                    url.scheme()
                )));
            }
            Err(e) => {
                return Err(ConfigError::InvalidValue(format!(
                    "site_root '{}' is not an absolute URL: {e}",
                    self.site_root
                )));
            }
        }

        if self.login_endpoint_path.trim_matches('/').is_empty() {
            return Err(ConfigError::InvalidValue(
                "login_endpoint_path cannot be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for shortname in self.role_mapping.shortnames() {
            if !seen.insert(shortname.to_lowercase()) {
                return Err(ConfigError::InvalidValue(format!(
                    "duplicate role mapping short-name: '{shortname}'"
                )));
            }
        }

        if self.courses.separator.is_empty() {
            return Err(ConfigError::InvalidValue(
                "courses.separator cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Returns the site root, always ending with `/`.
    #[must_use]
    pub fn site_root(&self) -> String {
        if self.site_root.ends_with('/') {
            self.site_root.clone()
        } else {
            format!("{}/", self.site_root)
        }
    }

    /// Returns the absolute URL of the login endpoint.
    #[must_use]
    pub fn login_endpoint_url(&self) -> String {
        format!(
            "{}{}",
            self.site_root(),
            self.login_endpoint_path.trim_start_matches('/')
        )
    }

    /// Returns the absolute URL errors raised before login redirect to.
    #[must_use]
    pub fn login_page_url(&self) -> String {
        format!(
            "{}{}",
            self.site_root(),
            self.login_page_path.trim_start_matches('/')
        )
    }

    /// Returns the categories that are logged instead of displayed.
    ///
    /// Empty unless `dont_display_to_user` is set.
    #[must_use]
    pub fn effective_suppressed_categories(&self) -> &[ErrorCategory] {
        if self.dont_display_to_user {
            &self.suppressed_categories
        } else {
            &[]
        }
    }
}
