use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use avatarlib::{AvatarResolver, Config, Exchange, Outcome};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

mod error;

use crate::error::AppError;

#[derive(Parser, Debug)]
#[command(name = "avatar-cli")]
#[command(about = "Resolve and cache avatar images", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the avatar of one entity into the cache
    Resolve {
        /// JSON file holding the entity, exposed as `req.user`
        #[arg(long)]
        entity: PathBuf,

        /// JSON file with configuration overrides
        #[arg(long)]
        config: Option<PathBuf>,

        /// JSON file merged into `req`, e.g. `{"query": {"size": 64}}`
        #[arg(long)]
        request: Option<PathBuf>,

        /// Copy the served image here
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Stands in for an HTTP exchange: "sending" the file copies it to `out`.
struct CliExchange {
    context: Value,
    out: Option<PathBuf>,
}

#[async_trait]
impl Exchange for CliExchange {
    fn context(&self) -> &Value {
        &self.context
    }

    async fn send_file(&mut self, path: &Path) -> avatarlib::Result<()> {
        match &self.out {
            Some(out) => {
                tokio::fs::copy(path, out).await?;
                println!("{}", out.display());
            }
            None => println!("{}", path.display()),
        }
        Ok(())
    }
}

fn read_json(path: &Path) -> Result<Value, AppError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AppError::InputReadError(path.display().to_string(), e.to_string())
    })?;
    serde_json::from_str(&content).map_err(|e| {
        AppError::InputParseError(path.display().to_string(), e.to_string())
    })
}

async fn resolve(
    entity: &Path,
    config: Option<&Path>,
    request: Option<&Path>,
    out: Option<PathBuf>,
) -> Result<Outcome, AppError> {
    let config = match config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };

    let failure = Arc::new(Mutex::new(None));
    let slot = failure.clone();
    let config = config.with_error_handler(move |err, _| {
        if let Ok(mut slot) = slot.lock() {
            *slot = Some(err.to_string());
        }
    });

    let mut req = match request {
        Some(path) => read_json(path)?,
        None => json!({}),
    };
    if let Value::Object(map) = &mut req {
        map.insert("user".to_owned(), read_json(entity)?);
    }

    let resolver = AvatarResolver::new(config)?;
    let mut exchange = CliExchange {
        context: json!({ "req": req, "res": {} }),
        out,
    };

    match resolver.handle(&mut exchange).await {
        Some(outcome) => Ok(outcome),
        None => {
            let message = failure
                .lock()
                .ok()
                .and_then(|mut slot| slot.take())
                .unwrap_or_else(|| "unknown failure".to_owned());
            Err(AppError::ResolutionError(message))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Cli::parse();

    match args.command {
        Command::Resolve {
            entity,
            config,
            request,
            out,
        } => {
            let outcome =
                resolve(&entity, config.as_deref(), request.as_deref(), out)
                    .await?;
            match outcome {
                Outcome::ServedFromCache(path) => {
                    log::info!("served from cache: {}", path.display())
                }
                Outcome::Resolved(avatar) => log::info!(
                    "fetched {}x{} avatar for {:?}",
                    avatar.width,
                    avatar.height,
                    avatar.identity
                ),
            }
        }
    }

    Ok(())
}
