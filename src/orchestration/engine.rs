//! # Routing Engine
//!
//! Entry point for "study is stable" events.
//!
//! ## Flow
//!
//! 1. Reject events missing the study id or study tags.
//! 2. Skip events this engine caused itself.
//! 3. List the study's instances and resolve their tags (concurrently).
//! 4. Evaluate every rule in declaration order:
//!    - `study_whole` / `highest_resolution` rules match against study tags
//!      only and dispatch the study, or the best instance, to each destination
//!    - `instance` rules match each unprocessed instance against its own tags
//!      and dispatch it to each destination; the first success marks it
//!      processed, which suppresses later instance rules for it
//!
//! First attempts for different destinations and instances run concurrently,
//! so one slow destination never delays the others.
//!
//! Failures are contained to the resource or destination they concern and are
//! reported on the event stream. Nothing is propagated back to the archive.

use super::dispatcher::{DispatchOutcome, Dispatcher};
use super::idempotency::IdempotencyTracker;
use super::retry_scheduler::{RetryPolicy, RetryScheduler};
use super::types::{EventOrigin, RoutingReport, RoutingStatus, StableStudyEvent};
use crate::archive::{
    Granularity, MarkerStore, ResourceRef, SendTransport, TagMap, TagResolver,
};
use crate::config::{ConfigManager, ConfigurationError, RouterConfig};
use crate::error::RouterError;
use crate::events::{EventPublisher, RouteEvent, RouteEventKind};
use crate::routing::{InstanceSelector, Rule, SendMode};
use crate::state_machine::DispatchAttempt;
use futures::future::join_all;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error};

/// Collaborators injected into the engine
#[derive(Clone)]
pub struct EngineDependencies {
    pub tags: Arc<dyn TagResolver>,
    pub markers: Arc<dyn MarkerStore>,
    pub transport: Arc<dyn SendTransport>,
}

pub struct RoutingEngine {
    rules: Vec<Rule>,
    engine_origin: String,
    tags: Arc<dyn TagResolver>,
    tracker: Arc<IdempotencyTracker>,
    dispatcher: Arc<Dispatcher>,
    scheduler: RetryScheduler,
    selector: InstanceSelector,
    publisher: EventPublisher,
}

impl std::fmt::Debug for RoutingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingEngine")
            .field("rules", &self.rules.len())
            .field("engine_origin", &self.engine_origin)
            .field("selector", &self.selector)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

/// Tags resolved for one sibling instance; `None` when resolution failed
type ResolvedInstance = (ResourceRef, Option<TagMap>);

impl RoutingEngine {
    /// Build an engine from an already validated configuration
    pub fn new(manager: &ConfigManager, deps: EngineDependencies) -> Self {
        Self::assemble(manager.config(), manager.rules().to_vec(), deps)
    }

    /// Validate `config` and build an engine from it
    pub fn from_config(
        config: RouterConfig,
        deps: EngineDependencies,
    ) -> Result<Self, ConfigurationError> {
        let rules = config.validate()?;
        Ok(Self::assemble(&config, rules, deps))
    }

    fn assemble(config: &RouterConfig, rules: Vec<Rule>, deps: EngineDependencies) -> Self {
        let publisher = EventPublisher::default();
        let tracker = Arc::new(IdempotencyTracker::new(deps.markers, publisher.clone()));
        let dispatcher = Arc::new(Dispatcher::new(
            deps.transport,
            tracker.clone(),
            publisher.clone(),
            config.send_timeout(),
            config.max_attempts,
        ));
        let scheduler = RetryScheduler::new(
            dispatcher.clone(),
            RetryPolicy::from_config(config),
            publisher.clone(),
        );

        Self {
            rules,
            engine_origin: config.engine_origin.clone(),
            tags: deps.tags,
            tracker,
            dispatcher,
            scheduler,
            selector: InstanceSelector::new(config.selection_metric),
            publisher,
        }
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn tracker(&self) -> &IdempotencyTracker {
        &self.tracker
    }

    /// Classify an origin label against this engine's own label
    pub fn origin_of(&self, label: Option<&str>) -> EventOrigin {
        EventOrigin::from_label(label, &self.engine_origin)
    }

    /// Wait for every background retry to reach a terminal state
    pub async fn drain_retries(&self) -> Vec<DispatchAttempt> {
        self.scheduler.drain().await
    }

    pub fn pending_retries(&self) -> usize {
        self.scheduler.pending()
    }

    /// Route one stable study
    pub async fn on_stable_study(&self, event: StableStudyEvent) -> RoutingReport {
        let StableStudyEvent {
            study_id,
            study_tags,
            origin,
        } = event;

        let (study_id, study_tags) = match (study_id, study_tags) {
            (Some(id), Some(tags)) if !id.trim().is_empty() => (id, tags),
            (id, tags) => {
                let missing = match (id.as_deref().map(str::trim), tags.is_some()) {
                    (None | Some(""), false) => "study_id and study_tags are required",
                    (None | Some(""), true) => "study_id is required",
                    _ => "study_tags are required",
                };
                let error = RouterError::InvalidCallback(missing.to_string());
                let mut published = RouteEvent::new(RouteEventKind::InvalidCallbackParams)
                    .error(&error);
                if let Some(id) = &id {
                    published = published.study(id);
                }
                self.publisher.publish(published);
                return RoutingReport::new(id, RoutingStatus::Rejected);
            }
        };

        if origin.is_engine() {
            self.publisher.publish(
                RouteEvent::new(RouteEventKind::FeedbackEventSkipped)
                    .study(&study_id)
                    .message("Event caused by this engine, not routing"),
            );
            return RoutingReport::new(Some(study_id), RoutingStatus::SkippedFeedback);
        }

        self.publisher.publish(
            RouteEvent::new(RouteEventKind::StudyReceived)
                .study(&study_id)
                .message(format!("Stable study received (origin {origin})")),
        );

        let mut report = RoutingReport::new(Some(study_id.clone()), RoutingStatus::Completed);

        let instances = match self.tags.list_instances(&study_id).await {
            Ok(instances) => instances,
            Err(source) => {
                let error = RouterError::metadata_fetch(&study_id, source);
                self.publisher.publish(
                    RouteEvent::new(RouteEventKind::FailedToGetInstances)
                        .study(&study_id)
                        .error(&error),
                );
                report.status = RoutingStatus::Aborted;
                return report;
            }
        };

        let resolved = self.resolve_instance_tags(&study_id, instances).await;

        for rule in &self.rules {
            let tally = match rule.granularity() {
                Granularity::Study => {
                    self.route_study(&study_id, &study_tags, rule, &resolved)
                        .await
                }
                Granularity::Instance => {
                    self.route_instances(&study_id, &study_tags, rule, &resolved)
                        .await
                }
            };
            tally.fold_into(&mut report);
        }

        debug!(
            study_id = %study_id,
            rules_matched = report.rules_matched,
            dispatches = report.dispatches,
            sent = report.sent,
            failed = report.failed,
            "Study routing pass finished"
        );
        report
    }

    async fn resolve_instance_tags(
        &self,
        study_id: &str,
        instances: Vec<ResourceRef>,
    ) -> Vec<ResolvedInstance> {
        let lookups = instances.into_iter().map(|instance| async move {
            let tags = self.tags.resolve_tags(&instance.id).await;
            (instance, tags)
        });

        join_all(lookups)
            .await
            .into_iter()
            .map(|(instance, tags)| match tags {
                Ok(tags) => (instance, Some(tags)),
                Err(source) => {
                    let error = RouterError::metadata_fetch(&instance.id, source);
                    self.publisher.publish(
                        RouteEvent::new(RouteEventKind::FailedToGetTags)
                            .study(study_id)
                            .resource(&instance.id)
                            .error(&error),
                    );
                    (instance, None)
                }
            })
            .collect()
    }

    async fn route_study(
        &self,
        study_id: &str,
        study_tags: &TagMap,
        rule: &Rule,
        resolved: &[ResolvedInstance],
    ) -> PassTally {
        if !rule.matches(study_tags, None) {
            return PassTally::default();
        }

        let target = match rule.action.send_mode {
            SendMode::HighestResolution => self
                .selector
                .select_best(resolved.iter().map(|(instance, tags)| (instance, tags.as_ref())))
                .map(|selection| selection.instance.clone()),
            SendMode::StudyWhole | SendMode::Instance => Some(ResourceRef::study(study_id)),
        };

        let Some(target) = target else {
            self.publisher.publish(
                RouteEvent::new(RouteEventKind::NoResourceToSend)
                    .study(study_id)
                    .rule(&rule.name)
                    .message(format!(
                        "No instance could be ranked by {}",
                        self.selector.metric()
                    )),
            );
            return PassTally::default();
        };

        self.publisher.publish(
            RouteEvent::new(RouteEventKind::RouteMatched)
                .study(study_id)
                .rule(&rule.name)
                .resource(&target.id)
                .message(format!("Matched at study granularity ({})", rule.action.send_mode.as_str())),
        );
        let mut tally = PassTally {
            rules_matched: 1,
            ..PassTally::default()
        };
        tally.record(
            self.dispatch_all(study_id, rule, &target, Granularity::Study)
                .await,
        );
        tally
    }

    /// Route every matching instance of the study
    ///
    /// Instances are handled concurrently so that a slow destination for one
    /// instance never holds back the others. The whole rule finishes before
    /// the next rule starts, which keeps marker suppression in rule order.
    async fn route_instances(
        &self,
        study_id: &str,
        study_tags: &TagMap,
        rule: &Rule,
        resolved: &[ResolvedInstance],
    ) -> PassTally {
        let candidates = resolved.iter().filter_map(|(instance, tags)| {
            let tags = tags.as_ref()?;
            rule.matches(study_tags, Some(tags)).then_some(instance)
        });

        join_all(candidates.map(|instance| self.route_instance(study_id, rule, instance)))
            .await
            .into_iter()
            .fold(PassTally::default(), PassTally::merge)
    }

    async fn route_instance(&self, study_id: &str, rule: &Rule, instance: &ResourceRef) -> PassTally {
        let mut tally = PassTally::default();
        let Some(_claim) = self.tracker.try_claim(&instance.id) else {
            return tally;
        };

        if self.tracker.is_processed(&instance.id).await {
            self.publisher.publish(
                RouteEvent::new(RouteEventKind::InstanceAlreadyProcessed)
                    .study(study_id)
                    .rule(&rule.name)
                    .resource(&instance.id),
            );
            tally.skipped_processed = 1;
            return tally;
        }

        self.publisher.publish(
            RouteEvent::new(RouteEventKind::RouteMatched)
                .study(study_id)
                .rule(&rule.name)
                .resource(&instance.id)
                .message("Matched at instance granularity"),
        );
        tally.rules_matched = 1;
        tally.record(
            self.dispatch_all(study_id, rule, instance, Granularity::Instance)
                .await,
        );
        tally
    }

    /// Send `target` to every destination of `rule`
    ///
    /// Submits start in list order and run concurrently. Outcomes come back in
    /// list order; `None` marks an attempt the state machine refused.
    async fn dispatch_all(
        &self,
        study_id: &str,
        rule: &Rule,
        target: &ResourceRef,
        granularity: Granularity,
    ) -> Vec<Option<bool>> {
        let sends = rule.action.destinations.iter().map(|destination| {
            let attempt =
                DispatchAttempt::new(study_id, &rule.name, target.clone(), destination, granularity);
            self.dispatch_one(attempt)
        });
        join_all(sends).await
    }

    /// First attempt for one pair; `Some(true)` when the transport accepted it
    async fn dispatch_one(&self, mut attempt: DispatchAttempt) -> Option<bool> {
        let first_attempt_at = Instant::now();

        match self.dispatcher.send(&mut attempt).await {
            Ok(DispatchOutcome::Sent(_)) => Some(true),
            Ok(DispatchOutcome::Failed {
                error,
                classification,
            }) => {
                self.scheduler
                    .handle_failure(attempt, error, classification, first_attempt_at);
                Some(false)
            }
            Err(transition_error) => {
                error!(
                    error = %transition_error,
                    destination = %attempt.destination,
                    resource_id = %attempt.resource.id,
                    "Dispatch attempt in unexpected state"
                );
                None
            }
        }
    }
}

/// Counters for one slice of a routing pass
#[derive(Debug, Default)]
struct PassTally {
    rules_matched: usize,
    dispatches: usize,
    sent: usize,
    failed: usize,
    skipped_processed: usize,
}

impl PassTally {
    fn record(&mut self, outcomes: Vec<Option<bool>>) {
        for outcome in outcomes {
            self.dispatches += 1;
            match outcome {
                Some(true) => self.sent += 1,
                Some(false) => self.failed += 1,
                None => {}
            }
        }
    }

    fn merge(mut self, other: Self) -> Self {
        self.rules_matched += other.rules_matched;
        self.dispatches += other.dispatches;
        self.sent += other.sent;
        self.failed += other.failed;
        self.skipped_processed += other.skipped_processed;
        self
    }

    fn fold_into(self, report: &mut RoutingReport) {
        report.rules_matched += self.rules_matched;
        report.dispatches += self.dispatches;
        report.sent += self.sent;
        report.failed += self.failed;
        report.skipped_processed += self.skipped_processed;
    }
}
