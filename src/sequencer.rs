//! Ordered log output.
//!
//! Every visible line goes through one bounded queue with a single consumer,
//! so lines are written strictly in the order they were enqueued. Producers
//! wait once the queue is full. The orchestrator enqueues whole transcripts in
//! account order after a round has joined, which keeps cross-account output
//! deterministic no matter which worker finished first.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::state_machine::Transcript;

/// Queue capacity before producers start waiting.
pub const QUEUE_CAPACITY: usize = 1000;

/// Destination for sequenced lines.
pub trait LogSink: Send + 'static {
    fn emit(&mut self, line: &str);
}

/// Writes each line as a `tracing` event so it carries the subscriber's
/// timestamp and formatting.
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&mut self, line: &str) {
        info!(target: "harvest", "{line}");
    }
}

/// Producer handle. Cheap to clone; the consumer stops once every clone is
/// dropped and the queue is empty.
#[derive(Debug, Clone)]
pub struct LogSender {
    tx: mpsc::Sender<String>,
}

impl LogSender {
    /// Enqueue one line, waiting while the queue is full.
    pub async fn send(&self, line: impl Into<String>) {
        if self.tx.send(line.into()).await.is_err() {
            debug!("log sequencer already stopped, line dropped");
        }
    }

    /// Enqueue every line of a transcript, in order.
    pub async fn send_transcript(&self, transcript: &Transcript) {
        for line in transcript.lines() {
            self.send(line.as_str()).await;
        }
    }
}

/// Handle to the consumer task.
pub struct LogSequencer {
    handle: JoinHandle<()>,
}

impl LogSequencer {
    /// Spawn the consumer task writing into `sink`.
    pub fn spawn<S: LogSink>(sink: S) -> (LogSender, LogSequencer) {
        Self::with_capacity(sink, QUEUE_CAPACITY)
    }

    pub fn with_capacity<S: LogSink>(mut sink: S, capacity: usize) -> (LogSender, LogSequencer) {
        let (tx, mut rx) = mpsc::channel::<String>(capacity);
        let handle = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                sink.emit(&line);
            }
        });
        (LogSender { tx }, LogSequencer { handle })
    }

    /// Wait until every queued line has been written. Returns only after all
    /// senders are gone.
    pub async fn drain(self) {
        if let Err(e) = self.handle.await {
            tracing::error!("log sequencer task failed: {e}");
        }
    }
}
