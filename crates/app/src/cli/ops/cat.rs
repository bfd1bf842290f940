use std::io::{self, Write};

use clap::Args;
use common::fs::FsError;

use crate::cli::op::{Op, OpContext, SessionError};

#[derive(Args, Debug, Clone)]
pub struct Cat {
    /// File to write to stdout
    pub path: String,
}

impl Op for Cat {
    type Error = SessionError;
    type Output = String;

    fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        ctx.with_fs(|fs| {
            let mut reader = fs.read_open(&self.path)?;
            let mut out = io::stdout().lock();
            io::copy(&mut reader, &mut out).map_err(FsError::from)?;
            out.flush().map_err(FsError::from)?;
            Ok::<_, SessionError>(())
        })?;
        // contents already went to stdout
        Ok(String::new())
    }
}
