use thiserror::Error;

/// Failure to create or start a focus or idle source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("not supported on this platform")]
    Unsupported,

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("failed to spawn source thread: {0}")]
    Spawn(#[from] std::io::Error),
}
