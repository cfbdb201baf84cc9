//! # Send Error Classification
//!
//! Decides whether a failed send is worth retrying.
//!
//! ## Overview
//!
//! Transport failures fall into two groups: transient ones (destination down,
//! network trouble, timeouts) that a later attempt may fix, and permanent ones
//! (unknown destination, outright rejection) that no retry will fix. Permanent
//! failures skip the remaining retry budget and go straight to
//! `FailedPermanent`.
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ SendError       │────▶│ ErrorClassifier │────▶│ Classification  │
//! │ + ErrorContext  │     │                 │     │ (retry or stop) │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```

use crate::error::SendError;
use serde::{Deserialize, Serialize};

/// Context information for error classification
#[derive(Debug, Clone)]
pub struct ErrorContext<'a> {
    pub resource_id: &'a str,
    pub destination: &'a str,
    /// Current attempt number (1-based)
    pub attempt_number: u32,
    /// Maximum allowed attempts
    pub max_attempts: u32,
}

/// Primary error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Will never succeed if retried
    Permanent,
    /// May succeed on retry
    Transient,
    Timeout,
    Network,
    /// Destination not configured on the transport side
    Configuration,
}

impl ErrorCategory {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient | Self::Timeout | Self::Network)
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Permanent => write!(f, "Permanent"),
            ErrorCategory::Transient => write!(f, "Transient"),
            ErrorCategory::Timeout => write!(f, "Timeout"),
            ErrorCategory::Network => write!(f, "Network"),
            ErrorCategory::Configuration => write!(f, "Configuration"),
        }
    }
}

/// Result of error classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub error_category: ErrorCategory,
    /// Whether another attempt should be scheduled
    pub is_retryable: bool,
    /// Whether the failed attempt used up the retry budget
    pub is_final_attempt: bool,
}

pub trait ErrorClassifier: Send + Sync {
    fn classify_error(&self, error: &SendError, context: &ErrorContext<'_>) -> ErrorClassification;
}

/// Default classification by error variant
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardErrorClassifier;

impl StandardErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    fn categorize(error: &SendError) -> ErrorCategory {
        match error {
            SendError::UnknownDestination(_) => ErrorCategory::Configuration,
            SendError::Rejected(_) => ErrorCategory::Permanent,
            SendError::Unavailable(_) | SendError::Transport(_) => ErrorCategory::Transient,
            SendError::Network(_) => ErrorCategory::Network,
            SendError::Timeout(_) => ErrorCategory::Timeout,
        }
    }
}

impl ErrorClassifier for StandardErrorClassifier {
    fn classify_error(&self, error: &SendError, context: &ErrorContext<'_>) -> ErrorClassification {
        let error_category = Self::categorize(error);
        let is_final_attempt = context.attempt_number >= context.max_attempts;

        ErrorClassification {
            error_category,
            is_retryable: error_category.is_retryable() && !is_final_attempt,
            is_final_attempt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn context(attempt_number: u32) -> ErrorContext<'static> {
        ErrorContext {
            resource_id: "inst-1",
            destination: "PACS",
            attempt_number,
            max_attempts: 3,
        }
    }

    #[test]
    fn test_transient_errors_retry_until_budget_spent() {
        let classifier = StandardErrorClassifier::new();
        let error = SendError::Unavailable("connection refused".into());

        let first = classifier.classify_error(&error, &context(1));
        assert_eq!(first.error_category, ErrorCategory::Transient);
        assert!(first.is_retryable);
        assert!(!first.is_final_attempt);

        let last = classifier.classify_error(&error, &context(3));
        assert!(!last.is_retryable);
        assert!(last.is_final_attempt);
    }

    #[test]
    fn test_timeouts_and_network_errors_are_retryable() {
        let classifier = StandardErrorClassifier::new();
        let timeout = SendError::Timeout(Duration::from_secs(30));
        let network = SendError::Network("reset by peer".into());

        assert_eq!(
            classifier.classify_error(&timeout, &context(1)).error_category,
            ErrorCategory::Timeout
        );
        assert!(classifier.classify_error(&network, &context(2)).is_retryable);
    }

    #[test]
    fn test_permanent_errors_never_retry() {
        let classifier = StandardErrorClassifier::new();

        let unknown = classifier.classify_error(
            &SendError::UnknownDestination("NOWHERE".into()),
            &context(1),
        );
        assert_eq!(unknown.error_category, ErrorCategory::Configuration);
        assert!(!unknown.is_retryable);

        let rejected =
            classifier.classify_error(&SendError::Rejected("bad SOP class".into()), &context(1));
        assert_eq!(rejected.error_category, ErrorCategory::Permanent);
        assert!(!rejected.is_retryable);
    }
}
