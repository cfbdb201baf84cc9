use crate::archive::{JobHandle, SendTransport};
use crate::error::SendError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// One observed `submit_send` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRecord {
    pub resource_id: String,
    pub destination: String,
    /// Tokio clock reading, so paused-time tests can assert offsets
    pub at: Instant,
}

/// Transport fake that records every call and replays scripted failures
///
/// Queued failures for a destination are consumed one per call before the
/// standing failure (if any) applies. Successful calls return `job-1`,
/// `job-2`, ... in call order.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<SendRecord>>,
    queued_failures: Mutex<HashMap<String, VecDeque<SendError>>>,
    standing_failures: Mutex<HashMap<String, SendError>>,
    latency: Mutex<Option<Duration>>,
    destination_latency: Mutex<HashMap<String, Duration>>,
    next_job: AtomicU64,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next calls to `destination` with `errors`, in order
    pub fn fail_next(&self, destination: &str, errors: impl IntoIterator<Item = SendError>) {
        self.queued_failures
            .lock()
            .entry(destination.to_string())
            .or_default()
            .extend(errors);
    }

    /// Fail every call to `destination`
    pub fn always_fail(&self, destination: &str, error: SendError) {
        self.standing_failures
            .lock()
            .insert(destination.to_string(), error);
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    /// Delay calls to `destination` by `latency`, overriding [`set_latency`](Self::set_latency)
    pub fn set_latency_for(&self, destination: &str, latency: Duration) {
        self.destination_latency
            .lock()
            .insert(destination.to_string(), latency);
    }

    pub fn calls(&self) -> Vec<SendRecord> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, destination: &str) -> Vec<SendRecord> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.destination == destination)
            .cloned()
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// `(resource_id, destination)` of every call, in call order
    pub fn sent_pairs(&self) -> Vec<(String, String)> {
        self.calls
            .lock()
            .iter()
            .map(|call| (call.resource_id.clone(), call.destination.clone()))
            .collect()
    }
}

#[async_trait]
impl SendTransport for RecordingTransport {
    async fn submit_send(
        &self,
        resource_id: &str,
        destination: &str,
    ) -> Result<JobHandle, SendError> {
        self.calls.lock().push(SendRecord {
            resource_id: resource_id.to_string(),
            destination: destination.to_string(),
            at: Instant::now(),
        });

        let latency = self
            .destination_latency
            .lock()
            .get(destination)
            .copied()
            .or(*self.latency.lock());
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let queued = self
            .queued_failures
            .lock()
            .get_mut(destination)
            .and_then(VecDeque::pop_front);
        if let Some(error) = queued {
            return Err(error);
        }
        if let Some(error) = self.standing_failures.lock().get(destination) {
            return Err(error.clone());
        }

        let job = self.next_job.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(JobHandle(format!("job-{job}")))
    }
}
