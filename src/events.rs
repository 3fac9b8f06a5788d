//! Message types crossing the engine's task boundaries.

use tokio::sync::{mpsc, oneshot};

use crate::config::{Layout, SlideProperties};
use crate::error::Error;

/// Lifecycle status of a file tracked by the sync subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Pending,
    Current,
    Deleted,
    Error,
}

/// One file as the sync subsystem reports it: a cache path, a locally
/// playable URL, and a status only the subsystem may write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedFile {
    pub file_path: String,
    pub file_url: String,
    pub status: FileStatus,
}

/// Whether a live sync connection backs the current playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchMode {
    #[default]
    Unset,
    Connected,
    Unavailable,
}

/// Notifications pushed by the sync subsystem for a subscription.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// Full-list semantics: the complete managed set, not a patch.
    FilesUpdated(Vec<ManagedFile>),
    FileError { file_path: String, message: String },
    FileDeleted { file_path: String },
}

/// Watch events carry the subscription epoch that produced them so the
/// engine can discard deliveries racing a stop or restart.
#[derive(Debug, Clone)]
pub struct WatchEnvelope {
    pub epoch: u64,
    pub event: WatchEvent,
}

/// Requests the engine sends to the file-sync subsystem.
#[derive(Debug)]
pub enum SyncRequest {
    StartWatch {
        epoch: u64,
        files: Vec<String>,
        events: mpsc::Sender<WatchEnvelope>,
        reply: oneshot::Sender<Result<(), Error>>,
    },
    StopWatch,
    Fetch {
        url: String,
        reply: oneshot::Sender<Result<Vec<u8>, Error>>,
    },
}

/// Host-side commands driving the engine.
#[derive(Debug)]
pub enum EngineCommand {
    /// One-time activation trigger; owns the very first start.
    Start,
    /// Recurring play signal; resets once the first start completed.
    Play,
    Stop,
    /// Replace the declarative properties and reset.
    Update(SlideProperties),
    /// Logo resolution callback surface.
    SetLogo(Option<String>),
    /// Licensing gate callback surface.
    SetLicense(bool),
    /// The paint primitive finished displaying a file.
    PaintDone { file_path: String },
    /// The paint primitive failed to load a file.
    PaintFailed {
        file_path: String,
        error_message: String,
    },
}

/// Events the engine emits to its host.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Handshake: the engine task is up and listening.
    Configured,
    ImageReset {
        files: Vec<String>,
        is_logo: bool,
        logo_file: Option<String>,
    },
    ImageError {
        file_path: String,
        error_message: String,
    },
    Unlicensed,
    /// Play-until-done completed or timed out.
    Done,
}

/// One frame handed to the paint primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub file_path: String,
    pub url: String,
    pub layout: Layout,
}

/// Instructions for the external paint primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    Show(Frame),
    Clear,
}
