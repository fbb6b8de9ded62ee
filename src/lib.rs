pub mod cache;
pub mod config;
pub mod entity;
mod errors;
pub mod exchange;
pub mod fetch;
pub mod key;
pub mod path;
pub mod resolver;
pub mod strategy;

pub use config::{Config, ConfigOverrides, EntityLocator, SizeSetting};
pub use errors::{AvatarError, ErrorKind, Result};
pub use exchange::Exchange;
pub use key::Avatar;
pub use path::ValuePath;
pub use resolver::{AvatarResolver, Outcome};
pub use strategy::{FetchTarget, StrategyKind};

pub const DEFAULT_CACHE_FOLDER: &str = ".avatar-cache";

pub const DEFAULT_USER_AGENT: &str =
    concat!("avatarlib/", env!("CARGO_PKG_VERSION"));
