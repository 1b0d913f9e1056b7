//! Login pipeline error types.
//!
//! Every stage of the login pipeline either returns a value or fails with a
//! [`LoginError`]. Each error knows which [`ErrorCategory`] it is reported
//! under and whether it must be shown to the end user regardless of the
//! suppression settings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::storage::DirectoryError;

/// Errors that terminate a login attempt.
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    /// The identity provider could not produce an assertion.
    #[error("Identity provider unavailable: {message}")]
    AssertionUnavailable {
        /// Description of the identity provider failure.
        message: String,
    },

    /// A required attribute is absent from the assertion or has no values.
    #[error("Attribute '{attribute}' was not found in the identity assertion")]
    MissingAttribute {
        /// The configured attribute name.
        attribute: String,
    },

    /// The principal is unknown and just-in-time provisioning is disabled.
    #[error("User '{username}' does not exist and automatic account creation is disabled")]
    JitDisabled {
        /// The normalized username.
        username: String,
    },

    /// The principal is unknown and none of its mapped courses is active.
    #[error("User '{username}' is not authorized: no mapped course is active")]
    NoMappedCourseActive {
        /// The normalized username.
        username: String,
    },

    /// An extension hook refused the login.
    #[error("{reason}")]
    DeniedByHook {
        /// The normalized username.
        username: String,
        /// Reason supplied by the hook.
        reason: String,
    },

    /// The directory could not create, find or update the principal.
    #[error("Authentication process failed for user '{username}': {source}")]
    DirectoryWriteFailure {
        /// The normalized username.
        username: String,
        /// The underlying directory failure.
        #[source]
        source: DirectoryError,
    },

    /// The directory could not return a complete profile for the principal.
    #[error("Could not load the complete profile of user '{username}'")]
    IncompleteProfile {
        /// The normalized username.
        username: String,
    },

    /// A course could not be mapped or enrolled.
    #[error("{message}")]
    CourseEnrollment {
        /// Description of the enrollment problem.
        message: String,
    },
}

impl LoginError {
    /// Creates a new `AssertionUnavailable` error.
    #[must_use]
    pub fn assertion_unavailable(message: impl Into<String>) -> Self {
        Self::AssertionUnavailable {
            message: message.into(),
        }
    }

    /// Creates a new `MissingAttribute` error.
    #[must_use]
    pub fn missing_attribute(attribute: impl Into<String>) -> Self {
        Self::MissingAttribute {
            attribute: attribute.into(),
        }
    }

    /// Creates a new `JitDisabled` error.
    #[must_use]
    pub fn jit_disabled(username: impl Into<String>) -> Self {
        Self::JitDisabled {
            username: username.into(),
        }
    }

    /// Creates a new `DirectoryWriteFailure` error.
    #[must_use]
    pub fn directory_write(username: impl Into<String>, source: DirectoryError) -> Self {
        Self::DirectoryWriteFailure {
            username: username.into(),
            source,
        }
    }

    /// Creates a new `CourseEnrollment` error.
    #[must_use]
    pub fn course_enrollment(message: impl Into<String>) -> Self {
        Self::CourseEnrollment {
            message: message.into(),
        }
    }

    /// Returns the error set category this error is reported under.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::CourseEnrollment { .. } => ErrorCategory::CourseEnrollment,
            _ => ErrorCategory::Login,
        }
    }

    /// Returns `true` if the error must be displayed even when its category
    /// is configured to be suppressed to the log.
    #[must_use]
    pub fn force_display(&self) -> bool {
        !matches!(self, Self::CourseEnrollment { .. })
    }

    /// Returns `true` if this error is an authorization denial.
    #[must_use]
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            Self::JitDisabled { .. } | Self::NoMappedCourseActive { .. } | Self::DeniedByHook { .. }
        )
    }
}

/// Keys of the error set accumulated during a login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Failures of the login itself.
    Login,
    /// Failures while mapping or enrolling courses.
    CourseEnrollment,
}

impl ErrorCategory {
    /// Returns the configuration key of the category.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::CourseEnrollment => "course_enrollment",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
