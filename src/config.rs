use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;

use crate::exchange::Exchange;
use crate::path::ValuePath;
use crate::strategy::StrategyKind;
use crate::{AvatarError, Result, DEFAULT_CACHE_FOLDER};

pub const DEFAULT_ENTITY_PATH: &str = "req.user";
pub const DEFAULT_ENTITY_ID_PATH: &str = "id";
pub const DEFAULT_SIZE: u32 = 200;
pub const GRAVATAR_BASE_URL: &str = "https://gravatar.com/avatar";
pub const GRAVATAR_DEFAULT_STYLE: &str = "identicon";
pub const MAPBOX_BASE_URL: &str = "https://api.mapbox.com/styles/v1";

/// Async lookup of the subject entity for one exchange.
pub type EntityFn = Arc<
    dyn for<'a> Fn(&'a dyn Exchange) -> BoxFuture<'a, Result<Value>>
        + Send
        + Sync,
>;

/// Receives every genuine failure of a pipeline run, at most once per run.
pub type ErrorHandler =
    Arc<dyn Fn(&AvatarError, &mut dyn Exchange) + Send + Sync>;

#[derive(Clone)]
pub enum EntityLocator {
    /// Dotted path into the exchange context.
    Path(ValuePath),
    Function(EntityFn),
}

impl EntityLocator {
    pub fn function<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a dyn Exchange) -> BoxFuture<'a, Result<Value>>
            + Send
            + Sync
            + 'static,
    {
        EntityLocator::Function(Arc::new(f))
    }
}

impl fmt::Debug for EntityLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityLocator::Path(path) => write!(f, "Path({})", path),
            EntityLocator::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Square avatar size, either literal or looked up per request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SizeSetting {
    Pixels(u32),
    /// Resolved against the exchange context (`req`, `res`, ...) with the
    /// entity added under `entity`. Unlike the other paths it is not
    /// entity-relative: a size stored on the entity needs the `entity.`
    /// prefix, e.g. `entity.preferences.size`.
    Path(ValuePath),
}

#[derive(Debug, Clone)]
pub struct GravatarSettings {
    /// Where the hashed value (usually an email) lives on the entity.
    pub path: ValuePath,
    /// Value of the `d` parameter, the identicon style.
    pub style: String,
    pub base_url: String,
}

impl Default for GravatarSettings {
    fn default() -> Self {
        Self {
            path: ValuePath::new("email"),
            style: GRAVATAR_DEFAULT_STYLE.to_owned(),
            base_url: GRAVATAR_BASE_URL.to_owned(),
        }
    }
}

/// Values used when a location sub-path resolves to nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationDefaults {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: f64,
    pub bearing: f64,
    pub style: String,
    pub style_type: String,
}

impl Default for LocationDefaults {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            zoom: 13.0,
            bearing: 0.0,
            style: "mapbox".to_owned(),
            style_type: "streets-v11".to_owned(),
        }
    }
}

/// Static map image centered on the entity's location. Sub-paths are
/// relative to the value found at `path`.
#[derive(Debug, Clone)]
pub struct LocationSettings {
    pub path: ValuePath,
    pub latitude: ValuePath,
    pub longitude: ValuePath,
    pub zoom: ValuePath,
    pub bearing: ValuePath,
    pub style: ValuePath,
    pub style_type: ValuePath,
    pub defaults: LocationDefaults,
    pub base_url: String,
    /// Map provider token, sent as the `access_token` query parameter.
    pub access_token: Option<String>,
}

impl Default for LocationSettings {
    fn default() -> Self {
        Self {
            path: ValuePath::new("location"),
            latitude: ValuePath::new("latitude"),
            longitude: ValuePath::new("longitude"),
            zoom: ValuePath::new("zoom"),
            bearing: ValuePath::new("bearing"),
            style: ValuePath::new("style"),
            style_type: ValuePath::new("styleType"),
            defaults: LocationDefaults::default(),
            base_url: MAPBOX_BASE_URL.to_owned(),
            access_token: None,
        }
    }
}

/// Immutable resolver configuration.
///
/// Start from [`Config::default`] and layer caller overrides on top with
/// [`Config::with_overrides`]. A strategy whose settings are `None` is
/// disabled and skipped by the chain.
#[derive(Clone)]
pub struct Config {
    pub entity: EntityLocator,
    /// Path into the entity giving the cache identity.
    pub entity_id: ValuePath,
    pub order: Vec<StrategyKind>,
    /// Serve existing cache files. Fetched images are persisted either way.
    pub cache: bool,
    pub cache_path: PathBuf,
    /// Wins over `width`/`height` when present.
    pub size: Option<SizeSetting>,
    pub width: u32,
    pub height: u32,
    /// Path to an explicit avatar URL on the entity.
    pub url: Option<ValuePath>,
    pub gravatar: Option<GravatarSettings>,
    pub location: Option<LocationSettings>,
    pub fallback_url: Option<String>,
    pub on_error: ErrorHandler,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            entity: EntityLocator::Path(ValuePath::new(DEFAULT_ENTITY_PATH)),
            entity_id: ValuePath::new(DEFAULT_ENTITY_ID_PATH),
            order: StrategyKind::ALL.to_vec(),
            cache: true,
            cache_path: PathBuf::from(DEFAULT_CACHE_FOLDER),
            size: None,
            width: DEFAULT_SIZE,
            height: DEFAULT_SIZE,
            url: Some(ValuePath::new("avatar")),
            gravatar: Some(GravatarSettings::default()),
            location: Some(LocationSettings::default()),
            fallback_url: None,
            on_error: Arc::new(|err: &AvatarError, _: &mut dyn Exchange| {
                log::warn!("avatar resolution failed: {}", err)
            }),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("entity", &self.entity)
            .field("entity_id", &self.entity_id)
            .field("order", &self.order)
            .field("cache", &self.cache)
            .field("cache_path", &self.cache_path)
            .field("size", &self.size)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("url", &self.url)
            .field("gravatar", &self.gravatar)
            .field("location", &self.location)
            .field("fallback_url", &self.fallback_url)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Parse JSON overrides and apply them onto the defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let overrides: ConfigOverrides = serde_json::from_str(json)
            .map_err(|e| AvatarError::Config(e.to_string()))?;
        Config::default().with_overrides(overrides)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        log::debug!("Loading configuration from {}", path.as_ref().display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn with_entity_fn<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&'a dyn Exchange) -> BoxFuture<'a, Result<Value>>
            + Send
            + Sync
            + 'static,
    {
        self.entity = EntityLocator::function(f);
        self
    }

    pub fn with_error_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&AvatarError, &mut dyn Exchange) + Send + Sync + 'static,
    {
        self.on_error = Arc::new(f);
        self
    }

    pub fn is_enabled(&self, kind: StrategyKind) -> bool {
        match kind {
            StrategyKind::Url => self.url.is_some(),
            StrategyKind::Gravatar => self.gravatar.is_some(),
            StrategyKind::Location => self.location.is_some(),
            StrategyKind::FallbackUrl => self
                .fallback_url
                .as_deref()
                .map_or(false, |url| !url.is_empty()),
        }
    }

    /// Apply every override that is set and validate the result.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Result<Self> {
        if let Some(entity) = overrides.entity {
            self.entity = match entity {
                Value::String(path) => EntityLocator::Path(ValuePath::new(&path)),
                other => {
                    return Err(AvatarError::EntityLocator(format!(
                        "expected a dotted path, got {}",
                        other
                    )))
                }
            };
        }
        if let Some(entity_id) = overrides.entity_id {
            self.entity_id = entity_id;
        }
        if let Some(order) = overrides.order {
            self.order = order;
        }
        if let Some(cache) = overrides.cache {
            self.cache = cache;
        }
        if let Some(cache_path) = overrides.cache_path {
            self.cache_path = cache_path;
        }
        if let Some(size) = overrides.size {
            self.size = Some(size);
        }
        if let Some(width) = overrides.width {
            self.width = width;
        }
        if let Some(height) = overrides.height {
            self.height = height;
        }

        if let Some(url) = overrides.url {
            self.url = match url {
                PathToggle::Switch(false) => None,
                PathToggle::Switch(true) => {
                    self.url.or_else(|| Some(ValuePath::new("avatar")))
                }
                PathToggle::Path(path) => Some(path),
            };
        }

        if let Some(gravatar) = overrides.gravatar {
            self.gravatar = match gravatar {
                Toggle::Switch(false) => None,
                Toggle::Switch(true) => Some(self.gravatar.unwrap_or_default()),
                Toggle::Path(path) => Some(GravatarSettings {
                    path,
                    ..self.gravatar.unwrap_or_default()
                }),
                Toggle::Settings(settings) => {
                    Some(settings.apply(self.gravatar.unwrap_or_default()))
                }
            };
        }

        if let Some(location) = overrides.location {
            self.location = match location {
                Toggle::Switch(false) => None,
                Toggle::Switch(true) => Some(self.location.unwrap_or_default()),
                Toggle::Path(path) => Some(LocationSettings {
                    path,
                    ..self.location.unwrap_or_default()
                }),
                Toggle::Settings(settings) => {
                    Some(settings.apply(self.location.unwrap_or_default()))
                }
            };
        }

        if let Some(fallback) = overrides.fallback_url {
            self.fallback_url = match fallback {
                UrlToggle::Switch(false) => None,
                UrlToggle::Switch(true) => self.fallback_url,
                UrlToggle::Url(url) if url.is_empty() => None,
                UrlToggle::Url(url) => Some(url),
            };
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(AvatarError::Config(format!(
                "width and height must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.size == Some(SizeSetting::Pixels(0)) {
            return Err(AvatarError::Config("size must be positive".to_owned()));
        }
        Ok(())
    }
}

/// Caller-supplied options, every field optional. Keys are camelCase.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigOverrides {
    pub entity: Option<Value>,
    pub entity_id: Option<ValuePath>,
    pub order: Option<Vec<StrategyKind>>,
    pub cache: Option<bool>,
    pub cache_path: Option<PathBuf>,
    pub size: Option<SizeSetting>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub url: Option<PathToggle>,
    pub gravatar: Option<Toggle<GravatarOverrides>>,
    pub location: Option<Toggle<LocationOverrides>>,
    pub fallback_url: Option<UrlToggle>,
}

/// `false` disables a strategy, `true` keeps its current settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Toggle<T> {
    Switch(bool),
    Path(ValuePath),
    Settings(T),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PathToggle {
    Switch(bool),
    Path(ValuePath),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UrlToggle {
    Switch(bool),
    Url(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GravatarOverrides {
    pub path: Option<ValuePath>,
    pub style: Option<String>,
    pub base_url: Option<String>,
}

impl GravatarOverrides {
    fn apply(self, mut settings: GravatarSettings) -> GravatarSettings {
        if let Some(path) = self.path {
            settings.path = path;
        }
        if let Some(style) = self.style {
            settings.style = style;
        }
        if let Some(base_url) = self.base_url {
            settings.base_url = base_url;
        }
        settings
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LocationDefaultsOverrides {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub zoom: Option<f64>,
    pub bearing: Option<f64>,
    pub style: Option<String>,
    pub style_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LocationOverrides {
    pub path: Option<ValuePath>,
    pub latitude: Option<ValuePath>,
    pub longitude: Option<ValuePath>,
    pub zoom: Option<ValuePath>,
    pub bearing: Option<ValuePath>,
    pub style: Option<ValuePath>,
    pub style_type: Option<ValuePath>,
    pub defaults: Option<LocationDefaultsOverrides>,
    pub base_url: Option<String>,
    pub access_token: Option<String>,
}

impl LocationOverrides {
    fn apply(self, mut settings: LocationSettings) -> LocationSettings {
        let paths = [
            (self.path, &mut settings.path),
            (self.latitude, &mut settings.latitude),
            (self.longitude, &mut settings.longitude),
            (self.zoom, &mut settings.zoom),
            (self.bearing, &mut settings.bearing),
            (self.style, &mut settings.style),
            (self.style_type, &mut settings.style_type),
        ];
        for (path, slot) in paths {
            if let Some(path) = path {
                *slot = path;
            }
        }

        if let Some(defaults) = self.defaults {
            let current = &mut settings.defaults;
            current.latitude = defaults.latitude.unwrap_or(current.latitude);
            current.longitude = defaults.longitude.unwrap_or(current.longitude);
            current.zoom = defaults.zoom.unwrap_or(current.zoom);
            current.bearing = defaults.bearing.unwrap_or(current.bearing);
            if let Some(style) = defaults.style {
                current.style = style;
            }
            if let Some(style_type) = defaults.style_type {
                current.style_type = style_type;
            }
        }
        if let Some(base_url) = self.base_url {
            settings.base_url = base_url;
        }
        if self.access_token.is_some() {
            settings.access_token = self.access_token;
        }
        settings
    }
}
