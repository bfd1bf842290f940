use clap::Args;
use common::fs::delete_file;

use crate::cli::op::{Op, OpContext, SessionError};

#[derive(Args, Debug, Clone)]
pub struct Rm {
    /// File or directory to remove
    pub path: String,

    /// Remove directories and everything below them
    #[arg(short, long)]
    pub recursive: bool,
}

impl Op for Rm {
    type Error = SessionError;
    type Output = String;

    fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        ctx.with_fs(|fs| {
            if self.recursive {
                fs.delete(&self.path)?;
            } else {
                delete_file(fs, &self.path)?;
            }
            Ok::<_, SessionError>(())
        })?;
        Ok(format!("Removed {}", self.path))
    }
}
