use std::error::Error;
use std::path::PathBuf;

use common::fs::{EncryptedFs, FsError};
use object_store::StoreError;

use crate::state::{AppState, StateError};

#[derive(Debug, Clone)]
pub struct OpContext {
    /// Optional custom state directory (defaults to ~/.sealfs)
    pub config_path: Option<PathBuf>,
    /// Password for setups whose key is derived rather than stored
    pub password: Option<String>,
}

impl OpContext {
    pub fn new(config_path: Option<PathBuf>, password: Option<String>) -> Self {
        Self {
            config_path,
            password,
        }
    }

    pub fn state(&self) -> Result<AppState, StateError> {
        AppState::load(self.config_path.clone())
    }

    /// Mount the configured filesystem, run `f` against it, then shut it
    ///  down so everything `f` changed is published before returning.
    pub fn with_fs<T, E>(&self, f: impl FnOnce(&EncryptedFs) -> Result<T, E>) -> Result<T, E>
    where
        E: From<SessionError>,
    {
        let fs = self.mount()?;
        let result = f(&fs);
        let closed = fs.shutdown().map_err(SessionError::from);
        let value = result?;
        closed?;
        Ok(value)
    }

    fn mount(&self) -> Result<EncryptedFs, SessionError> {
        let state = self.state()?;
        let store = state.config.store.build()?;
        let crypto = state.crypto(self.password.as_deref())?;
        let fs = EncryptedFs::mount(&state.fs_config(), store, crypto)?;
        Ok(fs)
    }
}

/// Failures shared by every command that mounts the filesystem.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Fs(#[from] FsError),
}

pub trait Op: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Output;

    fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::cli::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::cli::op::Op>::Error),
            )*
        }

        impl Command {
            pub fn name(&self) -> &'static str {
                match self {
                    $(Command::$variant(_) => stringify!($variant),)*
                }
            }
        }

        impl $crate::cli::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            fn execute(&self, ctx: &$crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => {
                            op.execute(ctx)
                                .map(OpOutput::$variant)
                                .map_err(OpError::$variant)
                        },
                    )*
                }
            }
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        OpOutput::$variant(output) => write!(f, "{}", output),
                    )*
                }
            }
        }
    };
}
