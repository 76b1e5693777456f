//! Narration sinks.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::status::reporter::StatusReporter;

/// Receives free-text progress messages during a run.
///
/// Narration is advisory: sinks must not block and their failures are
/// swallowed, never fed back into control flow.
pub trait Narrator: Send + Sync {
    fn narrate(&self, message: &str);
}

impl<F> Narrator for F
where
    F: Fn(&str) + Send + Sync,
{
    fn narrate(&self, message: &str) {
        self(message)
    }
}

/// Narrator that appends to one run's log in a [`StatusReporter`].
#[derive(Clone)]
pub struct RunNarrator {
    reporter: Arc<StatusReporter>,
    run_id: String,
}

impl RunNarrator {
    pub fn new(reporter: Arc<StatusReporter>, run_id: impl Into<String>) -> Self {
        Self {
            reporter,
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

impl Narrator for RunNarrator {
    fn narrate(&self, message: &str) {
        self.reporter.append(&self.run_id, message);
    }
}

/// Narrator that forwards messages into an unbounded channel.
///
/// Messages sent after the receiver is dropped are discarded.
pub struct ChannelNarrator {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelNarrator {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }

    /// Create a narrator together with the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl Narrator for ChannelNarrator {
    fn narrate(&self, message: &str) {
        let _ = self.tx.send(message.to_string());
    }
}

/// Fans one message out to several sinks.
#[derive(Default)]
pub struct TeeNarrator {
    sinks: Vec<Arc<dyn Narrator>>,
}

impl TeeNarrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn Narrator>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl Narrator for TeeNarrator {
    fn narrate(&self, message: &str) {
        for sink in &self.sinks {
            sink.narrate(message);
        }
    }
}

/// Send a message to an optional sink.
pub(crate) fn narrate(sink: Option<&dyn Narrator>, message: impl AsRef<str>) {
    if let Some(sink) = sink {
        sink.narrate(message.as_ref());
    }
}
