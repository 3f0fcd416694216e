//! Background index construction.
//!
//! The builder owns the index exclusively while it is being filled and hands
//! it over, finished and immutable, in a single `Finished` event. Progress is
//! reported every `progress_interval` words and once more at the end. The
//! cancel flag is read before every batch and before every progress report.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::index::{LexiconIndex, WordEntry};
use crate::settings::BuilderSettings;
use crate::store::SourceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildStatus {
    #[default]
    Idle,
    Building,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuildProgress {
    pub processed: usize,
    pub total: usize,
    pub percent: u8,
}

impl BuildProgress {
    fn new(processed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100
        } else {
            (processed * 100 / total) as u8
        };
        Self {
            processed,
            total,
            percent,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("word source is empty")]
    EmptySource,

    #[error("word source failed: {0}")]
    Source(#[from] SourceError),

    #[error("failed to spawn builder thread: {0}")]
    Spawn(io::Error),

    #[error("build cancelled")]
    Cancelled,

    #[error("a build is already running")]
    InProgress,
}

#[derive(Debug)]
pub enum BuildEvent {
    Progress(BuildProgress),
    Finished(LexiconIndex),
    Failed(BuildError),
}

#[derive(Debug, Clone)]
pub struct IndexBuilder {
    settings: BuilderSettings,
}

impl IndexBuilder {
    pub fn new(settings: BuilderSettings) -> Self {
        Self { settings }
    }

    /// Build on the calling thread. `on_progress` returning false aborts the
    /// build as if `cancel` had been set.
    pub fn build<F>(
        &self,
        entries: &[WordEntry],
        cancel: &AtomicBool,
        mut on_progress: F,
    ) -> Result<LexiconIndex, BuildError>
    where
        F: FnMut(BuildProgress) -> bool,
    {
        if entries.is_empty() {
            return Err(BuildError::EmptySource);
        }
        let total = entries.len();
        let interval = self.settings.progress_interval.max(1);
        let mut index = LexiconIndex::new();
        let mut processed = 0;
        let mut next_report = interval;

        let cancelled = |processed: usize| {
            let hit = cancel.load(Ordering::Relaxed);
            if hit {
                debug!(processed, total, "index build cancelled");
            }
            hit
        };

        for batch in entries.chunks(self.settings.batch_size.max(1)) {
            if cancelled(processed) {
                return Err(BuildError::Cancelled);
            }
            for entry in batch {
                index.insert_entry(entry);
                processed += 1;
                if processed >= next_report && processed < total {
                    next_report += interval;
                    if cancelled(processed) || !on_progress(BuildProgress::new(processed, total)) {
                        return Err(BuildError::Cancelled);
                    }
                }
            }
        }
        if cancelled(processed) || !on_progress(BuildProgress::new(total, total)) {
            return Err(BuildError::Cancelled);
        }

        info!(
            words = index.word_count(),
            nodes = index.node_count(),
            "index build finished"
        );
        Ok(index)
    }

    /// Build on a dedicated thread, reporting over a bounded channel.
    pub fn spawn(&self, entries: Vec<WordEntry>) -> Result<BuildHandle, BuildError> {
        let (tx, rx) = mpsc::channel(self.settings.channel_capacity.max(1));
        let cancel = Arc::new(AtomicBool::new(false));
        let builder = self.clone();
        let flag = Arc::clone(&cancel);

        thread::Builder::new()
            .name("lexicon-builder".into())
            .spawn(move || {
                let result = builder.build(&entries, &flag, |p| {
                    tx.blocking_send(BuildEvent::Progress(p)).is_ok()
                });
                let event = match result {
                    Ok(index) => BuildEvent::Finished(index),
                    // Cancellation closes the channel without a terminal event.
                    Err(BuildError::Cancelled) => return,
                    Err(e) => BuildEvent::Failed(e),
                };
                let _ = tx.blocking_send(event);
            })
            .map_err(BuildError::Spawn)?;

        Ok(BuildHandle { events: rx, cancel })
    }
}

/// Receiving side of a running build. Dropping the handle cancels the build.
pub struct BuildHandle {
    events: mpsc::Receiver<BuildEvent>,
    cancel: Arc<AtomicBool>,
}

impl BuildHandle {
    /// `None` once the build thread has exited.
    pub async fn next_event(&mut self) -> Option<BuildEvent> {
        self.events.recv().await
    }

    /// Blocking variant for callers outside an async runtime.
    pub fn blocking_next_event(&mut self) -> Option<BuildEvent> {
        self.events.blocking_recv()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn canceller(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Block until the build ends, discarding progress.
    pub fn wait(mut self) -> Result<LexiconIndex, BuildError> {
        while let Some(event) = self.blocking_next_event() {
            match event {
                BuildEvent::Progress(_) => {}
                BuildEvent::Finished(index) => return Ok(index),
                BuildEvent::Failed(e) => return Err(e),
            }
        }
        Err(BuildError::Cancelled)
    }
}

impl Drop for BuildHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
