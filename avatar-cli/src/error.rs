use avatarlib::AvatarError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Couldn't read {0}: {1}")]
    InputReadError(String, String),

    #[error("Invalid JSON in {0}: {1}")]
    InputParseError(String, String),

    #[error("Couldn't resolve avatar: {0}")]
    ResolutionError(String),

    #[error(transparent)]
    IoError(#[from] io::Error),

    #[error(transparent)]
    AvatarError(#[from] AvatarError),
}
