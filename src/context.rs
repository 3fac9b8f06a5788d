//! Capability context handed to the engine at construction.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::error::Error;
use crate::events::{SyncRequest, WatchEnvelope};

/// Default prefix template for preview-mode file URLs.
pub const STORAGE_PREFIX: &str = "https://storage.googleapis.com/";

/// Default wait for the first managed file after a subscription connects.
pub const DEFAULT_FIRST_FILE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Execution context the host is running the engine in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// A live display with a device-local file-sync connection.
    #[default]
    Display,
    /// An authoring/editor environment; no sync, no licensing.
    Preview,
}

/// Host identity used for preview URL query parameters. Each field may
/// independently be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerIdentity {
    pub display_id: Option<String>,
    pub company_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub mode: RunMode,
    pub viewer: ViewerIdentity,
}

impl Environment {
    pub fn is_preview(&self) -> bool {
        self.mode == RunMode::Preview
    }

    pub fn is_display(&self) -> bool {
        self.mode == RunMode::Display
    }
}

/// Request side of the file-sync subsystem.
#[derive(Debug, Clone)]
pub struct SyncClient {
    tx: mpsc::Sender<SyncRequest>,
}

impl SyncClient {
    pub fn new(tx: mpsc::Sender<SyncRequest>) -> Self {
        Self { tx }
    }

    /// Subscribe to availability updates for `files`. Events come back on
    /// `events`, stamped with `epoch`.
    pub async fn start_watch(
        &self,
        epoch: u64,
        files: Vec<String>,
        events: mpsc::Sender<WatchEnvelope>,
    ) -> Result<(), Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SyncRequest::StartWatch {
                epoch,
                files,
                events,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::SyncUnavailable("request channel closed".to_owned()))?;
        reply_rx
            .await
            .map_err(|_| Error::SyncUnavailable("subscription reply dropped".to_owned()))?
    }

    pub async fn stop_watch(&self) {
        let _ = self.tx.send(SyncRequest::StopWatch).await;
    }

    /// Read the content behind a locally playable URL.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SyncRequest::Fetch {
                url: url.to_owned(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::SyncUnavailable("request channel closed".to_owned()))?;
        reply_rx
            .await
            .map_err(|_| Error::SyncUnavailable("fetch reply dropped".to_owned()))?
    }
}

/// Everything the engine needs from its host, passed explicitly at
/// construction; there is no global player configuration.
#[derive(Debug, Clone)]
pub struct EngineContext {
    pub environment: Environment,
    pub sync: SyncClient,
    pub storage_prefix: String,
    pub first_file_timeout: Duration,
}

impl EngineContext {
    pub fn new(environment: Environment, sync: SyncClient) -> Self {
        Self {
            environment,
            sync,
            storage_prefix: STORAGE_PREFIX.to_owned(),
            first_file_timeout: DEFAULT_FIRST_FILE_TIMEOUT,
        }
    }
}
