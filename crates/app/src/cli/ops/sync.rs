use clap::Args;

use crate::cli::op::{Op, OpContext, SessionError};

#[derive(Args, Debug, Clone)]
pub struct SyncLog;

impl Op for SyncLog {
    type Error = SessionError;
    type Output = String;

    fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let published = ctx.with_fs(|fs| Ok::<_, SessionError>(fs.sync()?))?;
        Ok(match published {
            Some(name) => format!("Published {}", name),
            None => "Nothing to publish".to_string(),
        })
    }
}
