//! # Retry Scheduler
//!
//! Drives failed dispatch attempts through `Failed -> RetryScheduled -> Sending`
//! until they are `Sent` or `FailedPermanent`.
//!
//! Retry delays are offsets measured from the first attempt of a
//! `(resource, destination)` pair: with the defaults `[60, 120, 300]` and three
//! attempts, sends happen at `t=0`, `t=60s` and `t=120s`. Every pair retries in
//! its own task, so a slow or unavailable destination never delays the others.
//! There is no cancellation; outstanding tasks can be awaited with
//! [`RetryScheduler::drain`]. Tasks that finish on their own are reaped the
//! next time the scheduler is touched, so a long-running engine that never
//! drains does not accumulate them.

use super::dispatcher::{DispatchOutcome, Dispatcher};
use super::error_classifier::ErrorClassification;
use crate::config::RouterConfig;
use crate::error::{RouterError, SendError};
use crate::events::{EventPublisher, RouteEvent, RouteEventKind};
use crate::state_machine::{DispatchAttempt, DispatchEvent};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error};

/// Attempt cap plus the offset of every retry from the first attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    offsets: Vec<Duration>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, offsets: Vec<Duration>) -> Self {
        Self {
            max_attempts,
            offsets,
        }
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(config.max_attempts, config.retry_offsets())
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Offset from the first attempt at which attempt `attempt_number` fires
    ///
    /// Attempt 1 is immediate. `None` once the cap is exceeded.
    pub fn offset_for(&self, attempt_number: u32) -> Option<Duration> {
        match attempt_number {
            0 => None,
            1 => Some(Duration::ZERO),
            n if n > self.max_attempts => None,
            n => self.offsets.get((n - 2) as usize).copied(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RouterConfig::default())
    }
}

pub struct RetryScheduler {
    dispatcher: Arc<Dispatcher>,
    policy: RetryPolicy,
    publisher: EventPublisher,
    tasks: Mutex<JoinSet<DispatchAttempt>>,
}

impl std::fmt::Debug for RetryScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryScheduler")
            .field("policy", &self.policy)
            .field("tasks", &self.tasks.lock().len())
            .finish()
    }
}

impl RetryScheduler {
    pub fn new(dispatcher: Arc<Dispatcher>, policy: RetryPolicy, publisher: EventPublisher) -> Self {
        Self {
            dispatcher,
            policy,
            publisher,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Take over an attempt whose send just failed
    ///
    /// Permanent failures and exhausted budgets end `FailedPermanent` right
    /// away. Anything else is retried in a background task.
    pub fn handle_failure(
        &self,
        mut attempt: DispatchAttempt,
        error: SendError,
        classification: ErrorClassification,
        first_attempt_at: Instant,
    ) {
        let next = attempt.attempt_number + 1;
        let Some(offset) = self
            .policy
            .offset_for(next)
            .filter(|_| classification.is_retryable)
        else {
            abandon(&self.publisher, &mut attempt, &error);
            return;
        };

        let dispatcher = self.dispatcher.clone();
        let policy = self.policy.clone();
        let publisher = self.publisher.clone();

        let mut tasks = self.tasks.lock();
        reap_finished(&mut tasks);
        tasks.spawn(async move {
            retry_loop(
                dispatcher,
                policy,
                publisher,
                attempt,
                first_attempt_at,
                offset,
            )
            .await
        });
    }

    /// Number of retry loops that have not reached a terminal state
    pub fn pending(&self) -> usize {
        let mut tasks = self.tasks.lock();
        reap_finished(&mut tasks);
        tasks.len()
    }

    /// Wait for every outstanding retry task and return the final attempts
    ///
    /// Attempts already reaped by [`pending`](Self::pending) or an earlier
    /// [`handle_failure`](Self::handle_failure) are not returned again.
    pub async fn drain(&self) -> Vec<DispatchAttempt> {
        let mut tasks = std::mem::replace(&mut *self.tasks.lock(), JoinSet::new());
        let mut finished = Vec::with_capacity(tasks.len());

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(attempt) => finished.push(attempt),
                Err(join_error) => {
                    error!(error = %join_error, "Retry task terminated abnormally");
                }
            }
        }

        finished
    }
}

/// Drop every task that has already finished
fn reap_finished(tasks: &mut JoinSet<DispatchAttempt>) {
    while let Some(joined) = tasks.try_join_next() {
        match joined {
            Ok(attempt) => debug!(
                attempt_id = %attempt.attempt_id,
                state = %attempt.state,
                "Reaped finished retry task"
            ),
            Err(join_error) => {
                error!(error = %join_error, "Retry task terminated abnormally");
            }
        }
    }
}

async fn retry_loop(
    dispatcher: Arc<Dispatcher>,
    policy: RetryPolicy,
    publisher: EventPublisher,
    mut attempt: DispatchAttempt,
    first_attempt_at: Instant,
    mut offset: Duration,
) -> DispatchAttempt {
    loop {
        let fire_at = first_attempt_at + offset;
        let wait = fire_at.saturating_duration_since(Instant::now());
        let scheduled_at = Utc::now()
            + chrono::Duration::from_std(wait).unwrap_or_else(|_| chrono::Duration::zero());

        if let Err(transition_error) = attempt.transition(DispatchEvent::ScheduleRetry(scheduled_at))
        {
            error!(error = %transition_error, attempt_id = %attempt.attempt_id, "Cannot schedule retry");
            return attempt;
        }
        publisher.publish(
            event(RouteEventKind::RetryScheduled, &attempt)
                .attempt(attempt.attempt_number + 1)
                .message(format!("Retry scheduled in {}s", wait.as_secs())),
        );

        tokio::time::sleep_until(fire_at).await;

        let (error, classification) = match dispatcher.send(&mut attempt).await {
            Ok(DispatchOutcome::Sent(_)) => return attempt,
            Ok(DispatchOutcome::Failed {
                error,
                classification,
            }) => (error, classification),
            Err(transition_error) => {
                error!(error = %transition_error, attempt_id = %attempt.attempt_id, "Retry send rejected");
                return attempt;
            }
        };

        match policy
            .offset_for(attempt.attempt_number + 1)
            .filter(|_| classification.is_retryable)
        {
            Some(next) => offset = next,
            None => {
                abandon(&publisher, &mut attempt, &error);
                return attempt;
            }
        }
    }
}

fn abandon(publisher: &EventPublisher, attempt: &mut DispatchAttempt, error: &SendError) {
    if let Err(transition_error) = attempt.transition(DispatchEvent::Abandon) {
        error!(error = %transition_error, attempt_id = %attempt.attempt_id, "Cannot abandon attempt");
        return;
    }
    publisher.publish(
        event(RouteEventKind::SendFailedPermanent, attempt)
            .attempt(attempt.attempt_number)
            .error(RouterError::send(&attempt.destination, error.clone()))
            .message(format!(
                "Giving up after {} attempt(s)",
                attempt.attempt_number
            )),
    );
}

fn event(kind: RouteEventKind, attempt: &DispatchAttempt) -> RouteEvent {
    RouteEvent::new(kind)
        .study(&attempt.study_id)
        .rule(&attempt.rule_name)
        .resource(&attempt.resource.id)
        .destination(&attempt.destination)
}
