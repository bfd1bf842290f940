pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sealfs")]
#[command(about = "Encrypted overlay filesystem on top of plain object storage")]
pub struct Args {
    /// Path to the sealfs state directory (defaults to ~/.sealfs)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// Password the key is derived from, for password-protected setups
    #[arg(long, global = true, env = "SEALFS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: crate::Command,
}
