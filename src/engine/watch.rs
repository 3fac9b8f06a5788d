//! Subscription lifecycle against the file-sync subsystem.

use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::events::{EngineEvent, ManagedFile, WatchEnvelope, WatchEvent, WatchMode};

use super::timers::Timer;
use super::{Engine, TaskResult};

impl Engine {
    /// Subscribe to availability updates for the current valid file set. The
    /// subsystem answers asynchronously; a helper task forwards the outcome
    /// back into the loop so commands stay responsive meanwhile.
    pub(super) async fn start_watch(&mut self) {
        if self.watching {
            debug!("watch already active for the current file set");
            return;
        }
        self.watching = true;
        let epoch = self.epoch;
        let sync = self.ctx.sync.clone();
        let files = self.valid_files.clone();
        let events = self.watch_tx.clone();
        let task_tx = self.task_tx.clone();
        tokio::spawn(async move {
            let outcome = sync.start_watch(epoch, files, events).await;
            let _ = task_tx.send(TaskResult::WatchStarted { epoch, outcome }).await;
        });
    }

    /// Idempotent: safe when no watch was ever started. Always bumps the
    /// epoch so anything still in flight from a previous subscription is
    /// discarded at the loop boundary.
    pub(super) async fn stop_watch(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        if self.watching {
            self.watching = false;
            self.ctx.sync.stop_watch().await;
        }
    }

    pub(super) async fn handle_watch_started(&mut self, epoch: u64, outcome: Result<(), Error>) {
        if epoch != self.epoch || !self.watching {
            debug!("subscription outcome for a stale watch; ignoring");
            return;
        }
        match outcome {
            Ok(()) => {
                info!(
                    files = self.valid_files.len(),
                    "file-sync subscription established"
                );
                self.watch_mode = WatchMode::Connected;
                // Notifications may already have raced past the subscription
                // acknowledgment; the timeout only covers a still-empty set.
                if self.managed.is_empty() {
                    self.timers.arm(Timer::FirstFile, self.ctx.first_file_timeout);
                }
            }
            Err(err) => {
                warn!(
                    error = %err,
                    "file-sync subsystem unavailable; degrading to timed completion"
                );
                self.watch_mode = WatchMode::Unavailable;
                self.watching = false;
                self.arm_empty_done_timer();
            }
        }
    }

    pub(super) async fn handle_watch_envelope(&mut self, envelope: WatchEnvelope) {
        if envelope.epoch != self.epoch || !self.watching {
            debug!("watch event from a stale subscription; ignoring");
            return;
        }
        // A stamped event for the live epoch proves the subscription exists,
        // even if the acknowledgment is still in flight on its own channel.
        if self.watch_mode == WatchMode::Unset {
            self.watch_mode = WatchMode::Connected;
        }
        match envelope.event {
            WatchEvent::FilesUpdated(files) => self.handle_files_updated(files).await,
            WatchEvent::FileError { file_path, message } => {
                self.handle_file_error(file_path, message).await;
            }
            WatchEvent::FileDeleted { file_path } => self.handle_file_deleted(file_path).await,
        }
    }

    /// Full-list semantics: every add or update carries the complete managed
    /// set, and the render queue is rebuilt from scratch in valid-file order.
    async fn handle_files_updated(&mut self, files: Vec<ManagedFile>) {
        debug!(reported = files.len(), "managed file update");
        self.managed = files
            .into_iter()
            .map(|f| (f.file_path.clone(), f))
            .collect();
        self.configure_showing_images().await;
    }

    async fn handle_file_error(&mut self, file_path: String, message: String) {
        error!(file = %file_path, error = %message, "file-sync reported a file error");
        let _ = self
            .events
            .send(EngineEvent::ImageError {
                file_path: file_path.clone(),
                error_message: message.clone(),
            })
            .await;
        if self.queue.is_empty() {
            // Nothing is on screen and nothing may ever arrive; fall back to
            // the timed completion.
            self.health.record_failure(&file_path, &message);
            self.arm_empty_done_timer();
        }
    }

    async fn handle_file_deleted(&mut self, file_path: String) {
        info!(file = %file_path, "file removed from the local cache");
        self.managed.remove(&file_path);
        self.remove_from_queue(&file_path).await;
    }
}
