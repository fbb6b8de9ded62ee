use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::{Config, SizeSetting};
use crate::path::as_text;
use crate::strategy::FetchTarget;
use crate::{AvatarError, Result};

pub const CACHE_FILE_EXTENSION: &str = "png";

/// Working record of one resolution. The cache path doubles as the cache
/// key: same identity and dimensions always give the same file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Avatar {
    pub identity: String,
    pub width: u32,
    pub height: u32,
    pub cache_path: PathBuf,
    pub target: Option<FetchTarget>,
}

impl Avatar {
    /// Derive identity, dimensions and cache path.
    ///
    /// `context` is the exchange context; a size given as a path is
    /// resolved against it with the entity available under `entity`.
    pub fn derive(entity: &Value, context: &Value, config: &Config) -> Result<Self> {
        let identity = config
            .entity_id
            .resolve(entity)
            .map(as_text)
            .unwrap_or_default();
        if identity.is_empty() {
            log::debug!("entity has no value at {}", config.entity_id);
        }

        let (width, height) = match &config.size {
            None => (config.width, config.height),
            Some(SizeSetting::Pixels(size)) => (*size, *size),
            Some(SizeSetting::Path(path)) => {
                let merged = merge_context(entity, context);
                match path.resolve(&merged) {
                    Some(value) => {
                        let size = parse_size(value)?;
                        (size, size)
                    }
                    None => (config.width, config.height),
                }
            }
        };

        let cache_path = cache_path(&config.cache_path, &identity, width, height);
        log::trace!("derived cache path {}", cache_path.display());

        Ok(Self {
            identity,
            width,
            height,
            cache_path,
            target: None,
        })
    }
}

/// `{root}/{identity}-{width}x{height}.png`. `%` and path separators in
/// the identity are percent-encoded, so an entry can never leave the cache
/// root and distinct identities never share a file.
pub fn cache_path(root: &Path, identity: &str, width: u32, height: u32) -> PathBuf {
    root.join(format!(
        "{}-{}x{}.{}",
        escape_identity(identity),
        width,
        height,
        CACHE_FILE_EXTENSION
    ))
}

fn escape_identity(identity: &str) -> String {
    let mut escaped = String::with_capacity(identity.len());
    for c in identity.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '/' => escaped.push_str("%2F"),
            '\\' => escaped.push_str("%5C"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn merge_context(entity: &Value, context: &Value) -> Value {
    let mut merged = match context {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    merged.insert("entity".to_owned(), entity.clone());
    Value::Object(merged)
}

fn parse_size(value: &Value) -> Result<u32> {
    let size = match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && *f > 0.0)
                    .map(|f| f as u64)
            })
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    match size {
        Some(size) if size > 0 => Ok(size),
        _ => Err(AvatarError::InvalidSize(value.to_string())),
    }
}
