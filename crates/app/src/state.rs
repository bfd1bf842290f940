use std::{fs, path::PathBuf};

use common::config::{FsConfig, DEFAULT_MAX_SEGMENT_SIZE, DEFAULT_ROOT};
use common::crypto::{random_bytes, CryptoError, CryptoManager, MasterKey};
use object_store::ObjectStoreConfig;
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "sealfs";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const KEY_FILE_NAME: &str = "key.hex";
pub const STAGING_DIR_NAME: &str = "staging";
pub const REMOTE_DIR_NAME: &str = "remote";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory inside the store that holds `meta/` and `data/`
    #[serde(default = "default_root")]
    pub root: String,
    /// Largest object uploaded per file segment, in bytes
    #[serde(default = "default_max_segment_size")]
    pub max_segment_size: usize,
    /// Salt for a password-derived key. Without one the key file is used.
    #[serde(default)]
    pub salt: Option<String>,
    /// Default log level, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Where segments, logs and checkpoints are uploaded
    pub store: ObjectStoreConfig,
}

fn default_root() -> String {
    DEFAULT_ROOT.to_string()
}

fn default_max_segment_size() -> usize {
    DEFAULT_MAX_SEGMENT_SIZE
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl AppConfig {
    pub fn new(store: ObjectStoreConfig) -> Self {
        Self {
            root: default_root(),
            max_segment_size: default_max_segment_size(),
            salt: None,
            log_level: default_log_level(),
            store,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the sealfs directory (~/.sealfs)
    pub sealfs_dir: PathBuf,
    /// Path to the raw key, unused for password setups
    pub key_path: PathBuf,
    /// Path to the local staging directory for logs and checkpoints
    pub staging_path: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the sealfs directory path (custom or default ~/.sealfs)
    pub fn sealfs_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }
        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Default store for a fresh setup: a local directory next to the config
    pub fn default_store(sealfs_dir: &std::path::Path) -> ObjectStoreConfig {
        ObjectStoreConfig::Local {
            path: sealfs_dir.join(REMOTE_DIR_NAME),
        }
    }

    /// Initialize a new sealfs state directory
    ///
    /// A random key is generated unless the config carries a salt, in
    ///  which case the key is derived from a password on every use.
    pub fn init(custom_path: Option<PathBuf>, config: AppConfig) -> Result<Self, StateError> {
        let sealfs_dir = Self::sealfs_dir(custom_path)?;
        if sealfs_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }
        fs::create_dir_all(&sealfs_dir)?;

        let staging_path = sealfs_dir.join(STAGING_DIR_NAME);
        fs::create_dir_all(&staging_path)?;

        let key_path = sealfs_dir.join(KEY_FILE_NAME);
        if config.salt.is_none() {
            let key = MasterKey::generate()?;
            fs::write(&key_path, key.to_hex())?;
            restrict(&key_path)?;
        }

        let config_path = sealfs_dir.join(CONFIG_FILE_NAME);
        fs::write(&config_path, toml::to_string_pretty(&config)?)?;

        Ok(Self {
            sealfs_dir,
            key_path,
            staging_path,
            config_path,
            config,
        })
    }

    /// Load existing state from the sealfs directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let sealfs_dir = Self::sealfs_dir(custom_path)?;
        if !sealfs_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let key_path = sealfs_dir.join(KEY_FILE_NAME);
        let staging_path = sealfs_dir.join(STAGING_DIR_NAME);
        let config_path = sealfs_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config: AppConfig = toml::from_str(&fs::read_to_string(&config_path)?)?;
        if config.salt.is_none() && !key_path.exists() {
            return Err(StateError::MissingFile(KEY_FILE_NAME.to_string()));
        }

        Ok(Self {
            sealfs_dir,
            key_path,
            staging_path,
            config_path,
            config,
        })
    }

    pub fn fs_config(&self) -> FsConfig {
        FsConfig::new(&self.staging_path)
            .with_root(self.config.root.clone())
            .with_max_segment_size(self.config.max_segment_size)
    }

    /// Build the crypto manager from the key file or the password
    pub fn crypto(&self, password: Option<&str>) -> Result<CryptoManager, StateError> {
        match (&self.config.salt, password) {
            (Some(salt), Some(password)) => Ok(CryptoManager::from_password(password, salt)),
            (Some(_), None) => Err(StateError::PasswordRequired),
            (None, _) => {
                let encoded = fs::read_to_string(&self.key_path)?;
                let key = MasterKey::from_hex(&encoded)
                    .map_err(|e| StateError::InvalidKey(e.to_string()))?;
                Ok(CryptoManager::new(key))
            }
        }
    }
}

/// A fresh random salt for password setups
pub fn generate_salt() -> Result<String, StateError> {
    Ok(hex::encode(random_bytes::<16>()?))
}

#[cfg(unix)]
fn restrict(path: &std::path::Path) -> Result<(), StateError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict(_path: &std::path::Path) -> Result<(), StateError> {
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("sealfs directory not initialized. Run 'sealfs init' first")]
    NotInitialized,

    #[error("sealfs directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("this setup uses a password; pass --password or set SEALFS_PASSWORD")]
    PasswordRequired,

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}
