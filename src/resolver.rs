use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::CacheStore;
use crate::config::Config;
use crate::entity::resolve_entity;
use crate::exchange::Exchange;
use crate::fetch::Fetcher;
use crate::key::Avatar;
use crate::strategy;
use crate::Result;

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// An existing cache file was sent; no strategy ran.
    ServedFromCache(PathBuf),
    /// A strategy matched and its image was fetched, persisted and sent.
    Resolved(Avatar),
}

impl Outcome {
    pub fn cache_path(&self) -> &PathBuf {
        match self {
            Outcome::ServedFromCache(path) => path,
            Outcome::Resolved(avatar) => &avatar.cache_path,
        }
    }
}

/// Resolves, caches and serves avatars for exchanges. One resolver is
/// shared by all requests; it holds no per-request state.
#[derive(Debug, Clone)]
pub struct AvatarResolver {
    config: Arc<Config>,
    store: CacheStore,
    fetcher: Fetcher,
}

impl AvatarResolver {
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self::with_fetcher(config, Fetcher::new()?))
    }

    pub fn with_client(config: Config, client: reqwest::Client) -> Self {
        Self::with_fetcher(config, Fetcher::with_client(client))
    }

    fn with_fetcher(config: Config, fetcher: Fetcher) -> Self {
        let store = CacheStore::new(config.cache_path.clone(), config.cache);
        Self {
            config: Arc::new(config),
            store,
            fetcher,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the pipeline and route failures to the configured error
    /// handler, which is called at most once and never for cache hits.
    pub async fn handle(&self, exchange: &mut dyn Exchange) -> Option<Outcome> {
        match self.resolve(exchange).await {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                log::debug!("avatar pipeline failed: {}", err);
                (self.config.on_error)(&err, exchange);
                None
            }
        }
    }

    /// Run the pipeline without error routing.
    pub async fn resolve(&self, exchange: &mut dyn Exchange) -> Result<Outcome> {
        let config = &self.config;

        let (entity, ()) = tokio::join!(
            resolve_entity(&config.entity, &*exchange),
            self.store.prepare()
        );
        let entity = entity?;

        let mut avatar = Avatar::derive(&entity, exchange.context(), config)?;

        if let Some(path) = self.store.lookup(&avatar.cache_path).await {
            // A cache hit always ends the run; send failures stay out of
            // error routing.
            if let Err(err) = exchange.send_file(&path).await {
                log::warn!("failed to send cached avatar {}: {}", path.display(), err);
            }
            return Ok(Outcome::ServedFromCache(path));
        }

        let (kind, target) = strategy::select(&entity, &avatar, config)?;
        log::debug!(
            "resolving avatar {:?} with {} strategy",
            avatar.identity,
            kind
        );

        self.fetcher.persist(&target, &avatar.cache_path).await?;
        avatar.target = Some(target);

        exchange.send_file(&avatar.cache_path).await?;
        Ok(Outcome::Resolved(avatar))
    }
}
