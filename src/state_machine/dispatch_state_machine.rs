use super::{
    errors::{StateMachineError, StateMachineResult},
    events::DispatchEvent,
    states::DispatchState,
};
use crate::archive::{Granularity, JobHandle, ResourceRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One (resource, destination) send and its retry history
///
/// Lives only as long as the retry window; dropped once terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchAttempt {
    pub attempt_id: Uuid,
    pub study_id: String,
    pub rule_name: String,
    pub resource: ResourceRef,
    pub destination: String,
    /// Granularity the owning rule matched at; only `Instance` sends set the marker
    pub granularity: Granularity,
    /// Number of submit calls started so far
    pub attempt_number: u32,
    pub state: DispatchState,
    pub scheduled_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub job_handle: Option<JobHandle>,
}

impl DispatchAttempt {
    pub fn new(
        study_id: impl Into<String>,
        rule_name: impl Into<String>,
        resource: ResourceRef,
        destination: impl Into<String>,
        granularity: Granularity,
    ) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            study_id: study_id.into(),
            rule_name: rule_name.into(),
            resource,
            destination: destination.into(),
            granularity,
            attempt_number: 0,
            state: DispatchState::default(),
            scheduled_at: Utc::now(),
            last_error: None,
            job_handle: None,
        }
    }

    /// Whether a successful send should set the idempotency marker
    pub fn marks_processed(&self) -> bool {
        self.granularity == Granularity::Instance
    }

    /// Apply an event, returning the new state
    pub fn transition(&mut self, event: DispatchEvent) -> StateMachineResult<DispatchState> {
        let target = Self::determine_target_state(self.state, &event)?;

        match event {
            DispatchEvent::Start => {
                self.attempt_number += 1;
            }
            DispatchEvent::Succeed(handle) => {
                self.job_handle = Some(handle);
                self.last_error = None;
            }
            DispatchEvent::Fail(error) => {
                self.last_error = Some(error);
            }
            DispatchEvent::ScheduleRetry(at) => {
                self.scheduled_at = at;
            }
            DispatchEvent::Abandon => {}
        }

        tracing::debug!(
            attempt_id = %self.attempt_id,
            resource_id = %self.resource.id,
            destination = %self.destination,
            from = %self.state,
            to = %target,
            "Dispatch state transition"
        );

        self.state = target;
        Ok(target)
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: DispatchState,
        event: &DispatchEvent,
    ) -> StateMachineResult<DispatchState> {
        let target = match (current_state, event) {
            (DispatchState::Pending, DispatchEvent::Start) => DispatchState::Sending,
            (DispatchState::RetryScheduled, DispatchEvent::Start) => DispatchState::Sending,

            (DispatchState::Sending, DispatchEvent::Succeed(_)) => DispatchState::Sent,
            (DispatchState::Sending, DispatchEvent::Fail(_)) => DispatchState::Failed,

            (DispatchState::Failed, DispatchEvent::ScheduleRetry(_)) => {
                DispatchState::RetryScheduled
            }
            (DispatchState::Failed, DispatchEvent::Abandon) => DispatchState::FailedPermanent,

            (from_state, _) => {
                return Err(StateMachineError::InvalidTransition {
                    from: from_state.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt() -> DispatchAttempt {
        DispatchAttempt::new(
            "study-1",
            "rule",
            ResourceRef::instance("inst-1"),
            "PACS",
            Granularity::Instance,
        )
    }

    #[test]
    fn test_happy_path() {
        let mut a = attempt();
        assert_eq!(a.state, DispatchState::Pending);
        assert_eq!(a.transition(DispatchEvent::Start).unwrap(), DispatchState::Sending);
        assert_eq!(a.attempt_number, 1);
        assert_eq!(
            a.transition(DispatchEvent::Succeed(JobHandle("job-1".into())))
                .unwrap(),
            DispatchState::Sent
        );
        assert!(a.is_terminal());
        assert_eq!(a.job_handle, Some(JobHandle("job-1".into())));
    }

    #[test]
    fn test_retry_cycle_then_abandon() {
        let mut a = attempt();
        a.transition(DispatchEvent::Start).unwrap();
        a.transition(DispatchEvent::fail_with_error("refused")).unwrap();
        assert_eq!(a.last_error.as_deref(), Some("refused"));

        let at = Utc::now();
        assert_eq!(
            a.transition(DispatchEvent::ScheduleRetry(at)).unwrap(),
            DispatchState::RetryScheduled
        );
        assert_eq!(a.scheduled_at, at);

        a.transition(DispatchEvent::Start).unwrap();
        assert_eq!(a.attempt_number, 2);
        a.transition(DispatchEvent::fail_with_error("refused again"))
            .unwrap();
        assert_eq!(
            a.transition(DispatchEvent::Abandon).unwrap(),
            DispatchState::FailedPermanent
        );
        assert!(a.is_terminal());
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(DispatchAttempt::determine_target_state(
            DispatchState::Pending,
            &DispatchEvent::Succeed(JobHandle("x".into()))
        )
        .is_err());
        assert!(DispatchAttempt::determine_target_state(
            DispatchState::Sent,
            &DispatchEvent::Start
        )
        .is_err());
        assert!(DispatchAttempt::determine_target_state(
            DispatchState::FailedPermanent,
            &DispatchEvent::Start
        )
        .is_err());
        assert!(DispatchAttempt::determine_target_state(
            DispatchState::Sending,
            &DispatchEvent::Abandon
        )
        .is_err());
    }

    #[test]
    fn test_invalid_transition_leaves_state_untouched() {
        let mut a = attempt();
        let err = a.transition(DispatchEvent::Abandon).unwrap_err();
        assert_eq!(
            err,
            StateMachineError::InvalidTransition {
                from: "pending".into(),
                event: "abandon".into()
            }
        );
        assert_eq!(a.state, DispatchState::Pending);
        assert_eq!(a.attempt_number, 0);
    }

    #[test]
    fn test_study_granularity_does_not_mark() {
        let a = DispatchAttempt::new(
            "study-1",
            "rule",
            ResourceRef::instance("inst-1"),
            "MERCURE",
            Granularity::Study,
        );
        assert!(!a.marks_processed());
        assert!(attempt().marks_processed());
    }
}
