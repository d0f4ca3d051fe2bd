//! Activity log
//!
//! Handlers record `task_started` / `task_completed` / `task_errored` entries
//! on every execution. Recording is fire-and-forget: entries are pushed onto a
//! bounded channel and written by a background task, so a slow or failing sink
//! never delays or fails the task that produced the entry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default capacity of the activity channel
pub const DEFAULT_ACTIVITY_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    TaskStarted,
    TaskCompleted,
    TaskErrored,
}

/// One append-only activity record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub handler_id: String,
    pub action: ActivityAction,
    pub task_id: String,
    pub input: Value,
    pub output: Value,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(
        handler_id: impl Into<String>,
        action: ActivityAction,
        task_id: impl Into<String>,
        input: Value,
        output: Value,
    ) -> Self {
        Self {
            handler_id: handler_id.into(),
            action,
            task_id: task_id.into(),
            input,
            output,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("Failed to write activity entry: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize activity entry: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Activity sink rejected entry: {0}")]
    Rejected(String),
}

/// Destination of activity entries (audit table, log file, ...)
#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn record(&self, entry: &ActivityEntry) -> Result<(), ActivityError>;
}

/// Sink writing entries as structured `tracing` events
#[derive(Debug, Default)]
pub struct TracingActivitySink;

#[async_trait]
impl ActivitySink for TracingActivitySink {
    async fn record(&self, entry: &ActivityEntry) -> Result<(), ActivityError> {
        info!(
            target: "activity",
            handler_id = %entry.handler_id,
            action = ?entry.action,
            task_id = %entry.task_id,
            output = %entry.output,
            "handler activity"
        );
        Ok(())
    }
}

/// Sink appending one JSON document per line to a file
#[derive(Debug)]
pub struct JsonLinesActivitySink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesActivitySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl ActivitySink for JsonLinesActivitySink {
    async fn record(&self, entry: &ActivityEntry) -> Result<(), ActivityError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Cheap, cloneable handle used by handlers to emit activity entries
#[derive(Debug, Clone, Default)]
pub struct ActivityLogger {
    sender: Option<mpsc::Sender<ActivityEntry>>,
}

impl ActivityLogger {
    /// Start the background writer and return a handle to it
    ///
    /// Must be called from within a tokio runtime. The writer exits once every
    /// handle has been dropped and the channel is drained.
    pub fn spawn(sink: Arc<dyn ActivitySink>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<ActivityEntry>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(entry) = receiver.recv().await {
                if let Err(e) = sink.record(&entry).await {
                    warn!(
                        handler_id = %entry.handler_id,
                        task_id = %entry.task_id,
                        error = %e,
                        "Dropping activity entry after sink failure"
                    );
                }
            }
            debug!("Activity writer stopped");
        });

        (
            Self {
                sender: Some(sender),
            },
            handle,
        )
    }

    /// Logger that discards every entry
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Enqueue an entry without waiting; never fails the caller
    pub fn log(&self, entry: ActivityEntry) {
        let Some(sender) = &self.sender else {
            return;
        };

        match sender.try_send(entry) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(entry)) => {
                warn!(
                    handler_id = %entry.handler_id,
                    task_id = %entry.task_id,
                    "Activity channel full, dropping entry"
                );
            }
            Err(mpsc::error::TrySendError::Closed(entry)) => {
                debug!(
                    handler_id = %entry.handler_id,
                    "Activity writer closed, dropping entry"
                );
            }
        }
    }
}
