use clap::Args;

use crate::cli::op::{Op, OpContext, SessionError};

#[derive(Args, Debug, Clone)]
pub struct Df;

impl Op for Df {
    type Error = SessionError;
    type Output = String;

    fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let usage = ctx.with_fs(|fs| Ok::<_, SessionError>(fs.storage_usage()?))?;
        Ok(format!(
            "total: {}\nused: {}\navailable: {}",
            usage.total,
            usage.total.saturating_sub(usage.available),
            usage.available
        ))
    }
}
