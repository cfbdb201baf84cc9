//! # Dispatcher
//!
//! Submits one send request for a [`DispatchAttempt`] and records the outcome.
//!
//! The transport only queues the transfer; the dispatcher never waits for
//! delivery confirmation. Each submit call is bounded by the configured send
//! timeout, and an expired call counts as a retryable failure.

use super::error_classifier::{
    ErrorClassification, ErrorClassifier, ErrorContext, StandardErrorClassifier,
};
use super::idempotency::IdempotencyTracker;
use crate::archive::{JobHandle, SendTransport};
use crate::error::{RouterError, SendError};
use crate::events::{EventPublisher, RouteEvent, RouteEventKind};
use crate::state_machine::{DispatchAttempt, DispatchEvent, StateMachineResult};
use std::sync::Arc;
use std::time::Duration;

/// Result of a single submit call
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Sent(JobHandle),
    Failed {
        error: SendError,
        classification: ErrorClassification,
    },
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent(_))
    }
}

pub struct Dispatcher {
    transport: Arc<dyn SendTransport>,
    tracker: Arc<IdempotencyTracker>,
    classifier: Arc<dyn ErrorClassifier>,
    publisher: EventPublisher,
    send_timeout: Duration,
    max_attempts: u32,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("send_timeout", &self.send_timeout)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn SendTransport>,
        tracker: Arc<IdempotencyTracker>,
        publisher: EventPublisher,
        send_timeout: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            transport,
            tracker,
            classifier: Arc::new(StandardErrorClassifier::new()),
            publisher,
            send_timeout,
            max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run one submit call for `attempt`
    ///
    /// The attempt must be `Pending` or `RetryScheduled`. On success it ends
    /// `Sent` and, for instance-granularity sends, the instance is marked
    /// processed. On failure it ends `Failed` and the caller decides whether
    /// to retry.
    pub async fn send(&self, attempt: &mut DispatchAttempt) -> StateMachineResult<DispatchOutcome> {
        attempt.transition(DispatchEvent::Start)?;

        self.publisher.publish(
            Self::event(RouteEventKind::SendStarted, attempt).attempt(attempt.attempt_number),
        );

        let result = match tokio::time::timeout(
            self.send_timeout,
            self.transport
                .submit_send(&attempt.resource.id, &attempt.destination),
        )
        .await
        {
            Ok(result) => result,
            Err(_elapsed) => Err(SendError::Timeout(self.send_timeout)),
        };

        match result {
            Ok(handle) => {
                attempt.transition(DispatchEvent::Succeed(handle.clone()))?;
                self.publisher.publish(
                    Self::event(RouteEventKind::SendSuccess, attempt)
                        .attempt(attempt.attempt_number)
                        .job_handle(handle.as_str()),
                );

                if attempt.marks_processed() {
                    self.tracker.mark_processed(&attempt.resource.id).await;
                }

                Ok(DispatchOutcome::Sent(handle))
            }
            Err(error) => {
                attempt.transition(DispatchEvent::fail_with_error(error.to_string()))?;

                let classification = self.classifier.classify_error(
                    &error,
                    &ErrorContext {
                        resource_id: &attempt.resource.id,
                        destination: &attempt.destination,
                        attempt_number: attempt.attempt_number,
                        max_attempts: self.max_attempts,
                    },
                );

                self.publisher.publish(
                    Self::event(RouteEventKind::SendFailed, attempt)
                        .attempt(attempt.attempt_number)
                        .error(RouterError::send(&attempt.destination, error.clone()))
                        .message(format!(
                            "Send failed ({} error, attempt {} of {})",
                            classification.error_category,
                            attempt.attempt_number,
                            self.max_attempts
                        )),
                );

                Ok(DispatchOutcome::Failed {
                    error,
                    classification,
                })
            }
        }
    }

    fn event(kind: RouteEventKind, attempt: &DispatchAttempt) -> RouteEvent {
        RouteEvent::new(kind)
            .study(&attempt.study_id)
            .rule(&attempt.rule_name)
            .resource(&attempt.resource.id)
            .destination(&attempt.destination)
    }
}
