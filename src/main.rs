use anyhow::Result;
use clap::Parser;
use devsave::cli::{Cli, Commands};
use devsave::commands;

fn main() -> Result<()> {
    // Initialize logger (RUST_LOG=info cargo run -- ...)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Backup {
            source,
            target,
            device_name,
            exclude,
            no_manifest,
            hash,
            workers,
            dry_run,
            prune_deleted,
            compress,
        } => commands::backup(
            source,
            target,
            device_name,
            exclude,
            no_manifest,
            hash,
            workers,
            dry_run,
            prune_deleted,
            compress,
        )?,
        Commands::Restore {
            source,
            target,
            pattern,
            overwrite,
            newer,
            device_name,
            dry_run,
            list,
            workers,
        } => commands::restore(
            source,
            target,
            pattern,
            overwrite,
            newer,
            device_name,
            dry_run,
            list,
            workers,
        )?,
        Commands::Verify {
            target,
            device_name,
        } => commands::verify(target, device_name)?,
        Commands::Info {
            target,
            device_name,
        } => commands::info(target, device_name)?,
        Commands::Devices { target } => commands::devices(target)?,
        Commands::Compress {
            target,
            device_name,
            format,
            remove_source,
        } => commands::compress(target, device_name, format, remove_source)?,
    }

    Ok(())
}
