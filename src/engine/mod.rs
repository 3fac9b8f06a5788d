//! The managed slideshow engine.
//!
//! One async task owns every piece of mutable state: the render queue, the
//! transition cursor, the health flag, and a three-slot named timer set.
//! Collaborators only ever talk to it through channels, so rebuilds are
//! atomic with respect to any given event and cancellation (of a timer, a
//! watch epoch, or a render token) is the only concurrency control needed.

mod preview;
mod sequencer;
mod timers;
mod watch;

use std::collections::HashMap;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SlideProperties;
use crate::context::EngineContext;
use crate::error::Error;
use crate::events::{
    EngineCommand, EngineEvent, ManagedFile, PaintCommand, WatchEnvelope, WatchMode,
};
use crate::health::Health;
use crate::playlist;
use self::timers::{Timer, TimerSet};

const COMMAND_BUFFER: usize = 32;
const WATCH_BUFFER: usize = 64;
const TASK_BUFFER: usize = 16;

/// Host handle for driving a running engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    /// One-time activation trigger; owns the very first start.
    pub async fn start(&self) -> Result<(), Error> {
        self.send(EngineCommand::Start).await
    }

    /// Recurring play signal. Ignored until the first start completed.
    pub async fn play(&self) -> Result<(), Error> {
        self.send(EngineCommand::Play).await
    }

    pub async fn stop(&self) -> Result<(), Error> {
        self.send(EngineCommand::Stop).await
    }

    /// Replace the declarative properties, resetting a started show.
    pub async fn update(&self, props: SlideProperties) -> Result<(), Error> {
        self.send(EngineCommand::Update(props)).await
    }

    /// Logo resolution callback surface.
    pub async fn set_logo(&self, logo: Option<String>) -> Result<(), Error> {
        self.send(EngineCommand::SetLogo(logo)).await
    }

    /// Licensing gate callback surface.
    pub async fn set_license(&self, authorized: bool) -> Result<(), Error> {
        self.send(EngineCommand::SetLicense(authorized)).await
    }

    /// Report that the paint primitive finished displaying a file.
    pub async fn paint_done(&self, file_path: impl Into<String>) -> Result<(), Error> {
        self.send(EngineCommand::PaintDone {
            file_path: file_path.into(),
        })
        .await
    }

    /// Report that the paint primitive failed to load a file.
    pub async fn paint_failed(
        &self,
        file_path: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Result<(), Error> {
        self.send(EngineCommand::PaintFailed {
            file_path: file_path.into(),
            error_message: error_message.into(),
        })
        .await
    }

    async fn send(&self, cmd: EngineCommand) -> Result<(), Error> {
        self.tx.send(cmd).await.map_err(|_| Error::EngineClosed)
    }
}

/// Results of work the engine farmed out so its loop stays responsive.
#[derive(Debug)]
pub(crate) enum TaskResult {
    WatchStarted {
        epoch: u64,
        outcome: Result<(), Error>,
    },
    SvgInlined {
        token: u64,
        file_path: String,
        result: Result<String, Error>,
    },
}

pub struct Engine {
    props: SlideProperties,
    ctx: EngineContext,
    to_paint: mpsc::Sender<PaintCommand>,
    events: mpsc::Sender<EngineEvent>,

    cmd_rx: Option<mpsc::Receiver<EngineCommand>>,
    watch_tx: mpsc::Sender<WatchEnvelope>,
    watch_rx: Option<mpsc::Receiver<WatchEnvelope>>,
    task_tx: mpsc::Sender<TaskResult>,
    task_rx: Option<mpsc::Receiver<TaskResult>>,

    timers: TimerSet,
    health: Health,

    /// The one-time start trigger has fired.
    started: bool,
    licensed: bool,
    logo_file: Option<String>,
    /// Guards against overlapping completion paths (first-file timeout and
    /// the empty-done timer) reporting done twice within one start cycle.
    done_reported: bool,

    /// Current watch subscription epoch; stale deliveries are discarded.
    epoch: u64,
    watching: bool,
    watch_mode: WatchMode,

    valid_files: Vec<String>,
    managed: HashMap<String, ManagedFile>,
    queue: Vec<ManagedFile>,
    cursor: usize,
    /// Bumped on every render and stop so stale svg conversions are ignored.
    render_token: u64,
}

impl Engine {
    pub fn new(
        props: SlideProperties,
        ctx: EngineContext,
        to_paint: mpsc::Sender<PaintCommand>,
        events: mpsc::Sender<EngineEvent>,
    ) -> (Self, EngineHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let (watch_tx, watch_rx) = mpsc::channel(WATCH_BUFFER);
        let (task_tx, task_rx) = mpsc::channel(TASK_BUFFER);
        let engine = Self {
            props,
            ctx,
            to_paint,
            events,
            cmd_rx: Some(cmd_rx),
            watch_tx,
            watch_rx: Some(watch_rx),
            task_tx,
            task_rx: Some(task_rx),
            timers: TimerSet::default(),
            health: Health::default(),
            started: false,
            licensed: true,
            logo_file: None,
            done_reported: false,
            epoch: 0,
            watching: false,
            watch_mode: WatchMode::Unset,
            valid_files: Vec::new(),
            managed: HashMap::new(),
            queue: Vec::new(),
            cursor: 0,
            render_token: 0,
        };
        (engine, EngineHandle { tx: cmd_tx })
    }

    /// Drive the engine until cancellation or until the host drops its
    /// handle. All state changes happen inside this loop.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let mut cmd_rx = self.cmd_rx.take().expect("engine run consumed twice");
        let mut watch_rx = self.watch_rx.take().expect("engine run consumed twice");
        let mut task_rx = self.task_rx.take().expect("engine run consumed twice");

        let _ = self.events.send(EngineEvent::Configured).await;

        loop {
            let deadline = self.timers.next_deadline();
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("cancel received; stopping slideshow engine");
                    self.stop().await;
                    break;
                }
                maybe_cmd = cmd_rx.recv() => match maybe_cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => {
                        debug!("host handle dropped; stopping slideshow engine");
                        self.stop().await;
                        break;
                    }
                },
                Some(envelope) = watch_rx.recv() => self.handle_watch_envelope(envelope).await,
                Some(result) = task_rx.recv() => self.handle_task_result(result).await,
                timer = wait_for(deadline), if deadline.is_some() => {
                    self.timers.fired(timer);
                    self.handle_timer(timer).await;
                }
            }
        }
        Ok(())
    }

    async fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Start => {
                if self.started {
                    // A repeated start behaves like a play-driven reset.
                    self.reset().await;
                } else {
                    self.started = true;
                    self.start().await;
                }
            }
            EngineCommand::Play => {
                if self.started {
                    self.reset().await;
                } else {
                    // The very first activation belongs to the one-time start
                    // trigger; honoring this play too would double-start.
                    debug!("play received before the first start; ignoring");
                }
            }
            EngineCommand::Stop => self.stop().await,
            EngineCommand::Update(props) => {
                self.props = props;
                if self.started {
                    self.reset().await;
                }
            }
            EngineCommand::SetLogo(logo) => {
                let changed = self.logo_file != logo;
                self.logo_file = logo;
                if changed && self.props.is_logo && self.started {
                    self.reset().await;
                }
            }
            EngineCommand::SetLicense(authorized) => self.handle_license(authorized).await,
            EngineCommand::PaintDone { file_path } => self.handle_paint_done(&file_path),
            EngineCommand::PaintFailed {
                file_path,
                error_message,
            } => self.handle_paint_failed(file_path, error_message).await,
        }
    }

    async fn handle_task_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::WatchStarted { epoch, outcome } => {
                self.handle_watch_started(epoch, outcome).await;
            }
            TaskResult::SvgInlined {
                token,
                file_path,
                result,
            } => self.handle_svg_inlined(token, file_path, result).await,
        }
    }

    async fn handle_timer(&mut self, timer: Timer) {
        match timer {
            Timer::Transition => self.on_show_image_complete().await,
            Timer::FirstFile => {
                if !self.managed.is_empty() {
                    // A managed file arrived while the timer was in flight.
                    return;
                }
                warn!(
                    timeout = ?self.ctx.first_file_timeout,
                    "no file became available before the first-file timeout"
                );
                if self.props.play_until_done {
                    self.emit_done().await;
                }
            }
            Timer::EmptyDone => {
                debug!("empty slideshow finished its configured duration");
                self.emit_done().await;
            }
        }
    }

    /// Stop and restart with the current properties.
    async fn reset(&mut self) {
        self.stop().await;
        self.start().await;
    }

    async fn start(&mut self) {
        self.health.reset();
        self.done_reported = false;
        let candidates = playlist::resolve_candidates(&self.props, self.logo());
        let _ = self
            .events
            .send(EngineEvent::ImageReset {
                files: candidates.clone(),
                is_logo: self.props.is_logo,
                logo_file: self.logo_file.clone(),
            })
            .await;

        let mut valid = playlist::validate_files(&candidates, playlist::SUPPORTED_EXTENSIONS);
        if self.ctx.environment.is_preview() && !self.props.is_logo {
            valid.retain(|file| self.metadata_exists(file));
        }
        info!(
            candidates = candidates.len(),
            valid = valid.len(),
            is_logo = self.props.is_logo,
            "slideshow starting"
        );

        if valid.is_empty() {
            let _ = self.to_paint.send(PaintCommand::Clear).await;
            self.arm_empty_done_timer();
            return;
        }
        self.valid_files = valid;

        if self.ctx.environment.is_preview() {
            self.start_preview().await;
            return;
        }

        if !self.licensed {
            warn!("storage not licensed; slideshow will not display files");
            let _ = self.events.send(EngineEvent::Unlicensed).await;
            self.arm_empty_done_timer();
            return;
        }

        self.start_watch().await;
    }

    /// Tear down playback without clearing the painted surface, so an
    /// immediate restart with the same file does not flash.
    async fn stop(&mut self) {
        self.stop_watch().await;
        self.timers.cancel_all();
        self.queue.clear();
        self.valid_files.clear();
        self.managed.clear();
        self.cursor = 0;
        self.watch_mode = WatchMode::Unset;
        self.render_token = self.render_token.wrapping_add(1);
    }

    async fn handle_license(&mut self, authorized: bool) {
        if self.licensed == authorized {
            return;
        }
        self.licensed = authorized;
        if authorized {
            info!("storage licensing authorized");
            if self.started {
                self.reset().await;
            }
        } else {
            warn!("storage licensing revoked");
            let _ = self.events.send(EngineEvent::Unlicensed).await;
            if self.started {
                self.stop().await;
            }
        }
    }

    fn logo(&self) -> Option<&str> {
        if self.props.is_logo {
            self.logo_file.as_deref()
        } else {
            None
        }
    }

    fn metadata_exists(&self, file: &str) -> bool {
        self.props
            .metadata
            .iter()
            .find(|m| m.file == file)
            .is_none_or(|m| m.exists)
    }

    /// The degraded ending for a show with nothing to display: report done
    /// after the configured duration, but only when the host asked for a
    /// completion signal at all.
    fn arm_empty_done_timer(&mut self) {
        if self.props.play_until_done {
            self.timers.arm(Timer::EmptyDone, self.props.empty_done_delay());
        }
    }

    /// At most one done signal per start cycle.
    pub(super) async fn emit_done(&mut self) {
        if self.done_reported {
            return;
        }
        self.done_reported = true;
        let _ = self.events.send(EngineEvent::Done).await;
    }
}

async fn wait_for(deadline: Option<(Timer, tokio::time::Instant)>) -> Timer {
    match deadline {
        Some((timer, at)) => {
            tokio::time::sleep_until(at).await;
            timer
        }
        None => std::future::pending().await,
    }
}
