use thiserror::Error;

pub type Result<T> = std::result::Result<T, AvatarError>;

#[derive(Error, Debug)]
pub enum AvatarError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Entity locator error: {0}")]
    EntityLocator(String),
    #[error("Invalid size: {0}")]
    InvalidSize(String),
    #[error("No avatar resolved")]
    NoAvatarResolved,
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse category of a failure, for error handlers that only care about
/// presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Exhausted,
    Transport,
    Storage,
}

impl AvatarError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AvatarError::Config(_)
            | AvatarError::EntityLocator(_)
            | AvatarError::InvalidSize(_)
            | AvatarError::Json(_) => ErrorKind::Configuration,
            AvatarError::NoAvatarResolved => ErrorKind::Exhausted,
            AvatarError::Transport(_) | AvatarError::Url(_) => {
                ErrorKind::Transport
            }
            AvatarError::Io(_) | AvatarError::Other(_) => ErrorKind::Storage,
        }
    }
}
