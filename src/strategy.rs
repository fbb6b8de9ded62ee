use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{Config, GravatarSettings, LocationSettings};
use crate::key::Avatar;
use crate::path::{as_text, ValuePath};
use crate::{AvatarError, Result};

/// What to download: a bare URL, or a URL plus query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchTarget {
    Url(String),
    WithParams {
        url: String,
        params: BTreeMap<String, String>,
    },
}

impl FetchTarget {
    pub fn url(&self) -> &str {
        match self {
            FetchTarget::Url(url) => url,
            FetchTarget::WithParams { url, .. } => url,
        }
    }

    pub fn params(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            FetchTarget::Url(_) => None,
            FetchTarget::WithParams { params, .. } => Some(params),
        }
    }
}

/// Closed set of avatar sources, tried in the configured order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum StrategyKind {
    #[serde(rename = "url")]
    Url,
    #[serde(rename = "gravatar")]
    Gravatar,
    #[serde(rename = "location")]
    Location,
    #[serde(rename = "fallbackUrl")]
    FallbackUrl,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Url,
        StrategyKind::Gravatar,
        StrategyKind::Location,
        StrategyKind::FallbackUrl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Url => "url",
            StrategyKind::Gravatar => "gravatar",
            StrategyKind::Location => "location",
            StrategyKind::FallbackUrl => "fallbackUrl",
        }
    }

    /// Try to produce a fetch target for `entity`. Disabled strategies
    /// never match.
    pub fn attempt(
        &self,
        entity: &Value,
        avatar: &Avatar,
        config: &Config,
    ) -> Option<FetchTarget> {
        match self {
            StrategyKind::Url => {
                let path = config.url.as_ref()?;
                let url = path.resolve_present(entity)?;
                Some(FetchTarget::Url(as_text(url)))
            }
            StrategyKind::Gravatar => {
                gravatar(entity, avatar, config.gravatar.as_ref()?)
            }
            StrategyKind::Location => {
                location(entity, avatar, config.location.as_ref()?)
            }
            StrategyKind::FallbackUrl => config
                .fallback_url
                .as_ref()
                .filter(|url| !url.is_empty())
                .map(|url| FetchTarget::Url(url.clone())),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = AvatarError;

    fn from_str(s: &str) -> Result<Self> {
        StrategyKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AvatarError::Config(format!("unknown strategy {}", s)))
    }
}

/// Walk `config.order` and return the first strategy that matches.
pub fn select(
    entity: &Value,
    avatar: &Avatar,
    config: &Config,
) -> Result<(StrategyKind, FetchTarget)> {
    for kind in &config.order {
        if !config.is_enabled(*kind) {
            log::trace!("strategy {} is disabled, skipping", kind);
            continue;
        }
        if let Some(target) = kind.attempt(entity, avatar, config) {
            log::debug!("strategy {} matched {}", kind, target.url());
            return Ok((*kind, target));
        }
        log::trace!("strategy {} did not match", kind);
    }
    Err(AvatarError::NoAvatarResolved)
}

pub fn gravatar_hash(value: &str) -> String {
    format!("{:x}", md5::compute(value.as_bytes()))
}

fn gravatar(
    entity: &Value,
    avatar: &Avatar,
    settings: &GravatarSettings,
) -> Option<FetchTarget> {
    let source = settings.path.resolve_present(entity)?;
    let url = format!(
        "{}/{}",
        settings.base_url.trim_end_matches('/'),
        gravatar_hash(&as_text(source))
    );

    let mut params = BTreeMap::new();
    params.insert(
        "size".to_owned(),
        avatar.width.max(avatar.height).to_string(),
    );
    params.insert("d".to_owned(), settings.style.clone());
    Some(FetchTarget::WithParams { url, params })
}

fn location(
    entity: &Value,
    avatar: &Avatar,
    settings: &LocationSettings,
) -> Option<FetchTarget> {
    let located = settings.path.resolve_present(entity)?;
    let defaults = &settings.defaults;
    let field = |path: &ValuePath, default: String| {
        path.resolve(located).map(as_text).unwrap_or(default)
    };

    let style = field(&settings.style, defaults.style.clone());
    let style_type = field(&settings.style_type, defaults.style_type.clone());
    let longitude = field(&settings.longitude, defaults.longitude.to_string());
    let latitude = field(&settings.latitude, defaults.latitude.to_string());
    let zoom = field(&settings.zoom, defaults.zoom.to_string());
    let bearing = field(&settings.bearing, defaults.bearing.to_string());

    let url = format!(
        "{}/{}/{}/static/{},{},{},{}/{}x{}",
        settings.base_url.trim_end_matches('/'),
        style,
        style_type,
        longitude,
        latitude,
        zoom,
        bearing,
        avatar.width,
        avatar.height
    );

    match &settings.access_token {
        Some(token) => {
            let mut params = BTreeMap::new();
            params.insert("access_token".to_owned(), token.clone());
            Some(FetchTarget::WithParams { url, params })
        }
        None => Some(FetchTarget::Url(url)),
    }
}
