//! Miro migration tool - main entry point

use clap::Parser;
use miro_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use miro_migrate::commands;
use miro_migrate::pipeline::UploadOptions;
use miro_migrate::{Cli, Commands, MigrationConfig};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // Values from a local .env file; real environment variables win
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if cli.markdown_help {
        println!("{}", clap_markdown::help_markdown::<Cli>());
        return;
    }

    let Some(command) = &cli.command else {
        eprintln!("Error: A subcommand is required");
        eprintln!();
        eprintln!("For more information, try '--help'.");
        process::exit(2);
    };

    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Info })
        .output(LogOutput::Console)
        .log_file_prefix("miro-migrate")
        .build();

    // Environment variables take precedence over the flags
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // Logging failures should not stop a migration run
    let _guard = init_logging(&log_config).ok().flatten();

    let result = match MigrationConfig::from_env() {
        Ok(mut config) => {
            if let Some(index_db) = &cli.index_db {
                config.index_db = index_db.clone();
            }
            execute_command(command, &config).await
        }
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(command: &Commands, config: &MigrationConfig) -> miro_migrate::Result<()> {
    match command {
        Commands::CreateSourcedataIndex { source, overwrite } => {
            commands::indices::create_sourcedata(config, source.clone(), *overwrite).await
        }
        Commands::CreateFilesIndex { source, overwrite } => {
            commands::indices::create_files(config, source.clone(), *overwrite).await
        }
        Commands::CreateDecisionsIndex { source, overwrite } => {
            commands::indices::create_decisions(config, source.clone(), *overwrite).await
        }
        Commands::CreateChunksIndex { overwrite } => {
            commands::indices::create_chunks(config, *overwrite).await
        }
        Commands::CreateRegistrationsIndex { overwrite } => {
            commands::indices::create_registrations(config, *overwrite).await
        }

        Commands::SaveIndex {
            index_name,
            overwrite,
        } => commands::snapshot::save(config, index_name, *overwrite).await,
        Commands::LoadIndex {
            index_name,
            target_index_name,
            overwrite,
        } => {
            commands::snapshot::load(config, index_name, target_index_name.as_deref(), *overwrite)
                .await
        }

        Commands::TransferPackageChunks => commands::transfer::run(config).await,

        Commands::UploadTransferPackages {
            skip_upload,
            chunk_id,
            limit,
            overwrite,
        } => {
            let options = UploadOptions {
                skip_upload: *skip_upload,
                chunk_id: chunk_id.clone(),
                limit: *limit,
                overwrite: *overwrite,
            };
            commands::upload::run(config, options).await
        }

        Commands::DlcsSendRegistrations { limit } => commands::dlcs::send(config, *limit).await,
        Commands::DlcsUpdateRegistrations {
            limit,
            recheck_successful,
        } => commands::dlcs::update(config, *limit, *recheck_successful).await,

        Commands::IndexStatus => commands::status::run(config).await,
    }
}
