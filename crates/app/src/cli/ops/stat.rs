use clap::Args;

use crate::cli::op::{Op, OpContext, SessionError};

#[derive(Args, Debug, Clone)]
pub struct Stat {
    /// File or directory to describe
    pub path: String,
}

impl Op for Stat {
    type Error = SessionError;
    type Output = String;

    fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let info = ctx.with_fs(|fs| Ok::<_, SessionError>(fs.stat(&self.path)?))?;
        Ok(format!(
            "name: {}\ntype: {}\nsize: {}\ncreated: {}",
            if info.name.is_empty() { "/" } else { &info.name },
            if info.is_file { "file" } else { "directory" },
            info.size,
            info.creation_time.to_rfc3339()
        ))
    }
}
