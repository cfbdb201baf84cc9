use super::RouteEvent;
use crate::constants::defaults::EVENT_CHANNEL_CAPACITY;
use tokio::sync::broadcast;
use tracing::Level;

/// Publisher for routing events
///
/// Cloning is cheap; all clones share one broadcast channel.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<RouteEvent>,
}

macro_rules! log_route_event {
    ($level:ident, $event:expr) => {{
        let event = $event;
        tracing::$level!(
            event = event.kind.as_str(),
            study_id = event.study_id.as_deref(),
            rule = event.rule.as_deref(),
            resource_id = event.resource_id.as_deref(),
            destination = event.destination.as_deref(),
            attempt = event.attempt,
            job_handle = event.job_handle.as_deref(),
            error = event.error.as_deref(),
            "{}",
            event.message.as_deref().unwrap_or(event.kind.as_str())
        )
    }};
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Log the event and broadcast it to subscribers
    pub fn publish(&self, event: RouteEvent) {
        let level = event.kind.level();
        if level == Level::ERROR {
            log_route_event!(error, &event);
        } else if level == Level::WARN {
            log_route_event!(warn, &event);
        } else if level == Level::INFO {
            log_route_event!(info, &event);
        } else {
            log_route_event!(debug, &event);
        }

        // No subscribers is fine; the tracing record above is the primary sink
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<RouteEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(EVENT_CHANNEL_CAPACITY)
    }
}
