use std::path::PathBuf;

use clap::Args;
use common::config::{ConfigError, FsConfig};
use object_store::ObjectStoreConfig;

use crate::cli::op::{Op, OpContext, SessionError};
use crate::state::{generate_salt, AppConfig, AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Directory of the local object store (defaults to <state dir>/remote)
    #[arg(long)]
    pub store_path: Option<PathBuf>,

    /// Directory inside the store that holds the filesystem
    #[arg(long)]
    pub root: Option<String>,

    /// Largest object uploaded per file segment, in bytes
    #[arg(long)]
    pub max_segment_size: Option<usize>,

    /// Derive the key from --password instead of generating a key file
    #[arg(long)]
    pub use_password: bool,

    /// Default log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("--use-password needs --password or SEALFS_PASSWORD")]
    MissingPassword,
}

impl Op for Init {
    type Error = InitError;
    type Output = String;

    fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        if self.use_password && ctx.password.is_none() {
            return Err(InitError::MissingPassword);
        }

        let dir = AppState::sealfs_dir(ctx.config_path.clone())?;
        let store = match &self.store_path {
            Some(path) => ObjectStoreConfig::Local { path: path.clone() },
            None => AppState::default_store(&dir),
        };
        let mut config = AppConfig::new(store);
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if let Some(size) = self.max_segment_size {
            config.max_segment_size = size;
        }
        if self.use_password {
            config.salt = Some(generate_salt()?);
        }
        config.log_level = self.log_level.clone();

        // reject bad settings before anything is written
        FsConfig::new(&dir)
            .with_root(config.root.clone())
            .with_max_segment_size(config.max_segment_size)
            .validate()?;

        let state = AppState::init(Some(dir), config)?;
        tracing::info!("initialized sealfs state at {}", state.sealfs_dir.display());

        // first mount lays out the store and checks the key against it
        ctx.with_fs(|_| Ok::<_, InitError>(()))?;

        Ok(format!(
            "Initialized sealfs in {}\n  root: {}\n  store: {:?}\n  key: {}",
            state.sealfs_dir.display(),
            state.config.root,
            state.config.store,
            if state.config.salt.is_some() {
                "derived from password".to_string()
            } else {
                state.key_path.display().to_string()
            }
        ))
    }
}
