use clap::Args;
use common::tree::EntryInfo;

use crate::cli::op::{Op, OpContext, SessionError};

#[derive(Args, Debug, Clone)]
pub struct Ls {
    /// Directory to list
    #[arg(default_value = "/")]
    pub path: String,
}

impl Op for Ls {
    type Error = SessionError;
    type Output = String;

    fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let entries = ctx.with_fs(|fs| Ok::<_, SessionError>(fs.list(&self.path)?))?;
        if entries.is_empty() {
            return Ok("No entries found".to_string());
        }
        Ok(entries.iter().map(format_entry).collect::<Vec<_>>().join("\n"))
    }
}

pub fn format_entry(entry: &EntryInfo) -> String {
    let kind = if entry.is_dir() { 'd' } else { '-' };
    format!(
        "{} {:>12} {}  {}",
        kind,
        entry.size,
        entry.creation_time.format("%Y-%m-%d %H:%M:%S"),
        entry.name
    )
}
