use std::fs::File;
use std::path::PathBuf;

use clap::Args;
use common::fs::write_all;
use object_store::path::split_parent;

use crate::cli::op::{Op, OpContext, SessionError};

#[derive(Args, Debug, Clone)]
pub struct Put {
    /// Local file to upload
    pub source: PathBuf,

    /// Destination path in the filesystem
    pub path: String,

    /// Create missing parent directories
    #[arg(short, long)]
    pub parents: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum PutError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl Op for Put {
    type Error = PutError;
    type Output = String;

    fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let file = File::open(&self.source).map_err(|source| PutError::Open {
            path: self.source.clone(),
            source,
        })?;

        let written = ctx.with_fs(|fs| {
            if self.parents {
                let (parent, _) = split_parent(&self.path);
                fs.create_directory(parent).map_err(SessionError::from)?;
            }
            write_all(fs, &self.path, file).map_err(SessionError::from)
        })?;
        Ok(format!("Wrote {} bytes to {}", written, self.path))
    }
}
