use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid -box: {reason}")]
    InvalidBox { reason: String },

    #[error("Invalid -point: {reason}")]
    InvalidPoint { reason: String },

    #[error("Export cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Smospro(#[from] smospro::Error),
}
