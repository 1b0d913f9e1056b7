//! Error aggregation and reporting.
//!
//! Failures of a login attempt are collected in an [`ErrorSet`] keyed by
//! [`ErrorCategory`]. [`report`] decides what reaches the user: categories
//! configured as suppressible go to the log sink instead, unless display is
//! forced. A message is either displayed or logged, never both.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::error::{ErrorCategory, LoginError};
use crate::log_sink::{LogSink, LogSinkExt};

/// Messages accumulated during one login, by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ErrorSet {
    entries: IndexMap<ErrorCategory, Vec<String>>,
}

impl ErrorSet {
    /// Creates an empty error set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message to a category.
    pub fn push(&mut self, category: ErrorCategory, message: impl Into<String>) {
        self.entries.entry(category).or_default().push(message.into());
    }

    /// Appends an error under its own category.
    pub fn record(&mut self, error: &LoginError) {
        self.push(error.category(), error.to_string());
    }

    /// Returns the messages of a category.
    #[must_use]
    pub fn get(&self, category: ErrorCategory) -> Option<&[String]> {
        self.entries.get(&category).map(Vec::as_slice)
    }

    /// Removes a category, returning its messages.
    pub fn remove(&mut self, category: ErrorCategory) -> Option<Vec<String>> {
        self.entries.shift_remove(&category)
    }

    /// Iterates over categories and their messages.
    pub fn iter(&self) -> impl Iterator<Item = (ErrorCategory, &[String])> {
        self.entries
            .iter()
            .map(|(category, messages)| (*category, messages.as_slice()))
    }

    /// Returns the total number of messages.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Returns `true` if no message was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }
}

impl<M: Into<String>> FromIterator<(ErrorCategory, M)> for ErrorSet {
    fn from_iter<T: IntoIterator<Item = (ErrorCategory, M)>>(iter: T) -> Self {
        let mut set = Self::new();
        for (category, message) in iter {
            set.push(category, message);
        }
        set
    }
}

/// Error page shown to the end user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPage {
    /// Messages to display.
    pub errors: ErrorSet,
    /// Where the page sends the user afterwards.
    pub redirect: String,
}

/// Result of reporting an error set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Nothing is left to display; the login continues to its redirect.
    Proceed,
    /// The remaining errors must be displayed.
    Display(ErrorPage),
}

/// Reports an error set.
///
/// With `force_display`, every message is displayed. Otherwise the messages
/// of `suppressible` categories are written to `sink` and dropped; whatever
/// remains is displayed with `redirect_fallback` as the way out.
pub fn report(
    mut errors: ErrorSet,
    redirect_fallback: &str,
    sink: &dyn LogSink,
    suppressible: &[ErrorCategory],
    force_display: bool,
) -> ReportOutcome {
    if !force_display {
        for category in suppressible {
            if let Some(messages) = errors.remove(*category) {
                debug!(%category, count = messages.len(), "Suppressing errors to log sink");
                for message in &messages {
                    sink.error(message);
                }
            }
        }
    }

    if errors.is_empty() {
        ReportOutcome::Proceed
    } else {
        ReportOutcome::Display(ErrorPage {
            errors,
            redirect: redirect_fallback.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_sink::MemoryLogSink;

    fn mixed() -> ErrorSet {
        [
            (ErrorCategory::CourseEnrollment, "e1"),
            (ErrorCategory::CourseEnrollment, "e2"),
            (ErrorCategory::Login, "e3"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_suppressed_categories_go_to_log() {
        let sink = MemoryLogSink::new();
        let outcome = report(
            mixed(),
            "https://learn.example.org/",
            &sink,
            &[ErrorCategory::CourseEnrollment],
            false,
        );

        let expected: ErrorSet = [(ErrorCategory::Login, "e3")].into_iter().collect();
        assert_eq!(
            outcome,
            ReportOutcome::Display(ErrorPage {
                errors: expected,
                redirect: "https://learn.example.org/".to_string(),
            })
        );
        assert_eq!(sink.messages(), vec!["e1", "e2"]);
    }

    #[test]
    fn test_force_display_skips_suppression() {
        let sink = MemoryLogSink::new();
        let outcome = report(mixed(), "/", &sink, &[ErrorCategory::CourseEnrollment], true);

        match outcome {
            ReportOutcome::Display(page) => assert_eq!(page.errors.message_count(), 3),
            ReportOutcome::Proceed => panic!("expected errors to be displayed"),
        }
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn test_fully_suppressed_set_proceeds() {
        let sink = MemoryLogSink::new();
        let errors: ErrorSet = [(ErrorCategory::CourseEnrollment, "course MATH-101 is full")]
            .into_iter()
            .collect();

        let outcome = report(errors, "/", &sink, &[ErrorCategory::CourseEnrollment], false);
        assert_eq!(outcome, ReportOutcome::Proceed);
        assert_eq!(sink.messages(), vec!["course MATH-101 is full"]);
    }

    #[test]
    fn test_empty_set_proceeds() {
        let sink = MemoryLogSink::new();
        assert_eq!(
            report(ErrorSet::new(), "/", &sink, &[], false),
            ReportOutcome::Proceed
        );
    }

    #[test]
    fn test_without_suppression_everything_displayed() {
        let sink = MemoryLogSink::new();
        let outcome = report(mixed(), "/", &sink, &[], false);
        assert!(matches!(outcome, ReportOutcome::Display(ref page) if page.errors == mixed()));
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn test_record_uses_error_category() {
        let mut set = ErrorSet::new();
        set.record(&LoginError::jit_disabled("bob"));
        set.record(&LoginError::course_enrollment("Course HIST-200 not found"));

        assert_eq!(set.get(ErrorCategory::Login).map(<[String]>::len), Some(1));
        assert_eq!(
            set.get(ErrorCategory::CourseEnrollment).unwrap(),
            ["Course HIST-200 not found"]
        );
    }

    #[test]
    fn test_error_set_serializes_by_category() {
        let json = serde_json::to_value(mixed()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"course_enrollment": ["e1", "e2"], "login": ["e3"]})
        );
    }
}
