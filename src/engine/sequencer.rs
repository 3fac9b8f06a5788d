//! Transition playback over the render queue.

use tracing::{debug, error, info};

use crate::error::Error;
use crate::events::{EngineEvent, FileStatus, Frame, ManagedFile, PaintCommand, WatchMode};
use crate::playlist;
use crate::svg;

use super::timers::Timer;
use super::{Engine, TaskResult};

impl Engine {
    /// Rebuild the render queue from the valid-file order intersected with
    /// the managed files the subsystem reports as current, then restart
    /// playback from the head. Cancels any pending first-file timer: a file
    /// has arrived.
    pub(super) async fn configure_showing_images(&mut self) {
        self.timers.cancel(Timer::FirstFile);
        self.queue = self
            .valid_files
            .iter()
            .filter_map(|file| self.managed.get(file))
            .filter(|managed| managed.status == FileStatus::Current)
            .cloned()
            .collect();
        self.cursor = 0;
        debug!(queue = self.queue.len(), "render queue rebuilt");
        if self.queue.is_empty() {
            let _ = self.to_paint.send(PaintCommand::Clear).await;
        } else {
            self.render_current().await;
        }
    }

    pub(super) fn current_file(&self) -> Option<&ManagedFile> {
        self.queue.get(self.cursor)
    }

    async fn render_current(&mut self) {
        if let Some(managed) = self.current_file().cloned() {
            self.render_image(managed).await;
            self.start_transition_timer();
        }
    }

    /// Hand one file to the paint primitive, inlining SVG content first when
    /// the file comes from a live sync connection.
    async fn render_image(&mut self, managed: ManagedFile) {
        self.render_token = self.render_token.wrapping_add(1);
        let is_svg = playlist::file_extension(&managed.file_path).as_deref() == Some("svg");
        if self.watch_mode == WatchMode::Connected && is_svg {
            let token = self.render_token;
            let sync = self.ctx.sync.clone();
            let task_tx = self.task_tx.clone();
            tokio::spawn(async move {
                let result =
                    svg::inline_as_data_url(&sync, &managed.file_path, &managed.file_url).await;
                let _ = task_tx
                    .send(TaskResult::SvgInlined {
                        token,
                        file_path: managed.file_path,
                        result,
                    })
                    .await;
            });
            return;
        }
        let frame = Frame {
            file_path: managed.file_path,
            url: managed.file_url,
            layout: self.props.layout(),
        };
        let _ = self.to_paint.send(PaintCommand::Show(frame)).await;
    }

    pub(super) async fn handle_svg_inlined(
        &mut self,
        token: u64,
        file_path: String,
        result: Result<String, Error>,
    ) {
        if token != self.render_token {
            debug!(file = %file_path, "svg conversion finished for a frame no longer current; ignoring");
            return;
        }
        match result {
            Ok(data_url) => {
                let frame = Frame {
                    file_path,
                    url: data_url,
                    layout: self.props.layout(),
                };
                let _ = self.to_paint.send(PaintCommand::Show(frame)).await;
            }
            Err(err) => {
                error!(file = %file_path, error = %err, "svg conversion failed; frame left unrendered");
                let _ = self
                    .events
                    .send(EngineEvent::ImageError {
                        file_path,
                        error_message: err.to_string(),
                    })
                    .await;
            }
        }
    }

    /// Advance at the end of a transition. Reaching the end of the queue
    /// either completes a play-until-done run or re-filters the whole queue
    /// before looping, so membership changes land at the wrap point.
    pub(super) async fn on_show_image_complete(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let at_end = self.cursor + 1 >= self.queue.len();
        if at_end && self.props.play_until_done {
            info!("slideshow reached its last file; reporting done");
            self.emit_done().await;
            return;
        }
        if at_end {
            self.configure_showing_images().await;
            return;
        }
        self.cursor += 1;
        self.render_current().await;
    }

    /// At most one transition timer is ever outstanding; arming replaces any
    /// pending instance.
    fn start_transition_timer(&mut self) {
        match self.props.transition_delay() {
            Some(delay) => self.timers.arm(Timer::Transition, delay),
            None => self.timers.cancel(Timer::Transition),
        }
    }

    pub(super) fn handle_paint_done(&mut self, file_path: &str) {
        debug!(file = file_path, "paint completed");
        self.health.record_success();
    }

    /// A frame the paint primitive could not load: report it, mark health,
    /// and advance rather than retry in place so a broken file cannot stall
    /// the show for its full duration.
    pub(super) async fn handle_paint_failed(&mut self, file_path: String, error_message: String) {
        if self.current_file().map(|f| f.file_path.as_str()) != Some(file_path.as_str()) {
            debug!(file = %file_path, "paint failure for a frame no longer current; ignoring");
            return;
        }
        let source = match self.watch_mode {
            WatchMode::Connected => "file-sync",
            _ => "direct-url",
        };
        error!(file = %file_path, source, error = %error_message, "image failed to load");
        let _ = self
            .events
            .send(EngineEvent::ImageError {
                file_path: file_path.clone(),
                error_message: error_message.clone(),
            })
            .await;
        self.health.record_failure(&file_path, &error_message);
        self.timers.cancel(Timer::Transition);
        self.on_show_image_complete().await;
    }

    /// Targeted removal on deletion: the queue keeps playing without a full
    /// rebuild, with the cursor adjusted so the remaining order holds.
    pub(super) async fn remove_from_queue(&mut self, file_path: &str) {
        let was_current = self
            .current_file()
            .is_some_and(|f| f.file_path == file_path);
        let cursor = self.cursor;
        let mut removed_before_cursor = 0usize;
        let mut idx = 0usize;
        self.queue.retain(|entry| {
            let keep = entry.file_path != file_path;
            if !keep && idx < cursor {
                removed_before_cursor += 1;
            }
            idx += 1;
            keep
        });
        self.cursor = cursor.saturating_sub(removed_before_cursor);
        if self.queue.is_empty() {
            self.cursor = 0;
            self.timers.cancel(Timer::Transition);
            let _ = self.to_paint.send(PaintCommand::Clear).await;
            return;
        }
        if self.cursor >= self.queue.len() {
            self.cursor = 0;
        }
        if was_current {
            // The file on screen is gone; move on immediately.
            self.render_current().await;
        }
    }
}
