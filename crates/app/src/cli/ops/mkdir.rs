use clap::Args;

use crate::cli::op::{Op, OpContext, SessionError};

#[derive(Args, Debug, Clone)]
pub struct Mkdir {
    /// Directory to create, along with any missing parents
    pub path: String,
}

impl Op for Mkdir {
    type Error = SessionError;
    type Output = String;

    fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        ctx.with_fs(|fs| Ok::<_, SessionError>(fs.create_directory(&self.path)?))?;
        Ok(format!("Created {}", self.path))
    }
}
