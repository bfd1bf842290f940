mod cli;
mod logging;
mod state;

use anyhow::Context;
use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Cat, Checkpoint, Df, Init, Ls, Mkdir, Put, Rm, Stat, SyncLog, Version};

command_enum! {
    (Cat, Cat),
    (Checkpoint, Checkpoint),
    (Df, Df),
    (Init, Init),
    (Ls, Ls),
    (Mkdir, Mkdir),
    (Put, Put),
    (Rm, Rm),
    (Stat, Stat),
    (Sync, SyncLog),
    (Version, Version),
}

fn run(args: Args) -> anyhow::Result<OpOutput> {
    let ctx = cli::op::OpContext::new(args.config_path, args.password);
    let output = args
        .command
        .execute(&ctx)
        .with_context(|| format!("{} failed", args.command.name().to_lowercase()))?;
    Ok(output)
}

fn main() {
    let args = Args::parse();
    logging::init(args.config_path.clone());
    logging::register_panic_logger();

    match run(args) {
        Ok(output) => {
            let output = output.to_string();
            if !output.is_empty() {
                println!("{}", output);
            }
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{AppConfig, AppState};
    use object_store::ObjectStoreConfig;
    use tempfile::TempDir;

    #[test]
    fn test_sync_command() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("state");
        AppState::init(
            Some(dir.clone()),
            AppConfig::new(ObjectStoreConfig::Local {
                path: temp.path().join("remote"),
            }),
        )
        .unwrap();

        let args = Args::try_parse_from(["sealfs", "--config-path", dir.to_str().unwrap(), "sync"])
            .unwrap();
        assert!(matches!(args.command, Command::Sync(SyncLog)));
        assert_eq!(args.command.name(), "Sync");

        // a fresh mount has no records to publish
        let output = run(args).unwrap();
        assert_eq!(output.to_string(), "Nothing to publish");
    }
}
