use clap::Args;

use crate::cli::op::{Op, OpContext, SessionError};

#[derive(Args, Debug, Clone)]
pub struct Checkpoint;

impl Op for Checkpoint {
    type Error = SessionError;
    type Output = String;

    fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let name = ctx.with_fs(|fs| Ok::<_, SessionError>(fs.checkpoint()?))?;
        Ok(format!("Wrote {}", name))
    }
}
