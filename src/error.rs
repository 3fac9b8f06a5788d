use thiserror::Error;

/// Library error type for slideshow operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The file-sync subsystem could not establish or keep a subscription.
    #[error("file-sync subsystem unavailable: {0}")]
    SyncUnavailable(String),

    /// A fetch was asked for a file the local cache does not hold.
    #[error("no such file in the local cache: {0}")]
    FetchNotFound(String),

    /// A file URL the engine cannot resolve to local content.
    #[error("unsupported file url: {0}")]
    BadUrl(String),

    /// The engine task has exited; its command channel is closed.
    #[error("slideshow engine is no longer running")]
    EngineClosed,

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),
}
