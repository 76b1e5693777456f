//! Run-keyed narration log with a live event stream.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::status::narrator::RunNarrator;

/// Default capacity of the live event channel.
const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// One narration entry for a run.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub run_id: String,
    /// Position of this entry in the run's log, starting at 0.
    pub seq: usize,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

type RunLog = Arc<Mutex<Vec<StatusEvent>>>;

/// Process-wide narration store, partitioned by run id.
///
/// Each run's log sits behind its own mutex, so appends for different runs
/// never contend on the same lock. The outer map is only write-locked the
/// first time a run id is seen. Entries live until the reporter is dropped.
pub struct StatusReporter {
    logs: RwLock<HashMap<String, RunLog>>,
    events: broadcast::Sender<StatusEvent>,
}

impl StatusReporter {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create a reporter whose live stream buffers `capacity` events per
    /// subscriber before slow subscribers start skipping.
    pub fn with_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            logs: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Append a message to a run's log and publish it to subscribers.
    pub fn append(&self, run_id: &str, message: impl Into<String>) {
        let log = self.log_for(run_id);
        let mut entries = log.lock().unwrap_or_else(|e| e.into_inner());
        let event = StatusEvent {
            run_id: run_id.to_string(),
            seq: entries.len(),
            message: message.into(),
            timestamp: Utc::now(),
        };
        entries.push(event.clone());
        // Published while the run lock is held so subscribers see append order.
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Messages appended so far for a run. Unknown runs yield an empty list.
    pub fn snapshot(&self, run_id: &str) -> Vec<String> {
        self.entries(run_id).into_iter().map(|e| e.message).collect()
    }

    /// Full entries (with sequence numbers and timestamps) for a run.
    pub fn entries(&self, run_id: &str) -> Vec<StatusEvent> {
        let log = {
            let logs = self.logs.read().unwrap_or_else(|e| e.into_inner());
            logs.get(run_id).cloned()
        };
        match log {
            Some(log) => log.lock().unwrap_or_else(|e| e.into_inner()).clone(),
            None => Vec::new(),
        }
    }

    /// Run ids that have at least one entry, sorted.
    pub fn run_ids(&self) -> Vec<String> {
        let logs = self.logs.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = logs.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Subscribe to live events, optionally for a single run.
    ///
    /// Only events appended after this call are delivered. Dropping the
    /// subscription unsubscribes.
    pub fn subscribe(&self, run_id: Option<&str>) -> StatusSubscription {
        StatusSubscription {
            rx: self.events.subscribe(),
            run_id: run_id.map(str::to_string),
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// A narration sink bound to one run.
    pub fn narrator(self: &Arc<Self>, run_id: impl Into<String>) -> RunNarrator {
        RunNarrator::new(Arc::clone(self), run_id)
    }

    fn log_for(&self, run_id: &str) -> RunLog {
        {
            let logs = self.logs.read().unwrap_or_else(|e| e.into_inner());
            if let Some(log) = logs.get(run_id) {
                return Arc::clone(log);
            }
        }
        let mut logs = self.logs.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(logs.entry(run_id.to_string()).or_default())
    }
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// A live view of status events.
pub struct StatusSubscription {
    rx: broadcast::Receiver<StatusEvent>,
    run_id: Option<String>,
}

impl StatusSubscription {
    /// Wait for the next matching event.
    ///
    /// Returns `None` once the reporter is gone. A subscriber that falls
    /// behind skips the events it missed rather than failing.
    pub async fn recv(&mut self) -> Option<StatusEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Status subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Turn the subscription into a stream of matching events.
    pub fn into_stream(self) -> impl futures::Stream<Item = StatusEvent> + Send + 'static {
        use tokio_stream::StreamExt;

        let run_id = self.run_id;
        tokio_stream::wrappers::BroadcastStream::new(self.rx).filter_map(move |result| {
            result
                .ok()
                .filter(|event| run_id.as_deref().is_none_or(|id| event.run_id == id))
        })
    }

    fn matches(&self, event: &StatusEvent) -> bool {
        self.run_id
            .as_deref()
            .is_none_or(|id| event.run_id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_snapshot_unknown_run_is_empty() {
        let reporter = StatusReporter::new();
        assert!(reporter.snapshot("run_missing").is_empty());
        assert!(reporter.run_ids().is_empty());
    }

    #[test]
    fn test_append_preserves_order() {
        let reporter = StatusReporter::new();
        reporter.append("run_a", "first");
        reporter.append("run_a", "second");
        reporter.append("run_a", "third");

        assert_eq!(reporter.snapshot("run_a"), vec!["first", "second", "third"]);
        let seqs: Vec<usize> = reporter.entries("run_a").iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn test_snapshot_is_non_destructive() {
        let reporter = StatusReporter::new();
        reporter.append("run_a", "hello");
        assert_eq!(reporter.snapshot("run_a"), reporter.snapshot("run_a"));
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_isolated() {
        let reporter = Arc::new(StatusReporter::new());

        let mut handles = Vec::new();
        for run in ["run_a", "run_b"] {
            let reporter = Arc::clone(&reporter);
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    reporter.append(run, format!("{run}:{i}"));
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let a = reporter.snapshot("run_a");
        let b = reporter.snapshot("run_b");
        assert_eq!(a.len(), 50);
        assert_eq!(b.len(), 50);
        assert!(a.iter().all(|m| m.starts_with("run_a:")));
        assert!(b.iter().all(|m| m.starts_with("run_b:")));
        assert_eq!(a[49], "run_a:49");
        assert_eq!(reporter.run_ids(), vec!["run_a", "run_b"]);
    }

    #[tokio::test]
    async fn test_subscription_filters_by_run() {
        let reporter = StatusReporter::new();
        let mut sub = reporter.subscribe(Some("run_a"));

        reporter.append("run_b", "not for you");
        reporter.append("run_a", "for you");

        let event = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.run_id, "run_a");
        assert_eq!(event.message, "for you");
    }

    #[tokio::test]
    async fn test_unfiltered_subscription_sees_all_in_order() {
        let reporter = StatusReporter::new();
        let mut sub = reporter.subscribe(None);

        reporter.append("run_a", "one");
        reporter.append("run_b", "two");

        assert_eq!(sub.recv().await.unwrap().message, "one");
        assert_eq!(sub.recv().await.unwrap().message, "two");
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let reporter = StatusReporter::new();
        let sub = reporter.subscribe(None);
        assert_eq!(reporter.subscriber_count(), 1);
        drop(sub);
        assert_eq!(reporter.subscriber_count(), 0);
        // Appending with no subscribers still records the entry.
        reporter.append("run_a", "kept");
        assert_eq!(reporter.snapshot("run_a"), vec!["kept"]);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_instead_of_failing() {
        let reporter = StatusReporter::with_capacity(2);
        let mut sub = reporter.subscribe(None);

        for i in 0..5 {
            reporter.append("run_a", format!("m{i}"));
        }

        let event = sub.recv().await.unwrap();
        assert_eq!(event.message, "m3");
        // The log itself is complete regardless.
        assert_eq!(reporter.snapshot("run_a").len(), 5);
    }

    #[tokio::test]
    async fn test_into_stream_filters() {
        use futures::StreamExt;

        let reporter = StatusReporter::new();
        let mut stream = Box::pin(reporter.subscribe(Some("run_b")).into_stream());

        reporter.append("run_a", "skip");
        reporter.append("run_b", "take");

        let event = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.message, "take");
    }
}
