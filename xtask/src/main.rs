//! Build automation tasks for the Miro migration tool
//!
//! Currently generates the CLI reference from the clap definitions.

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for miro-migrate", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<miro_migrate::Cli>();

    let content = format!(
        r#"# miro-migrate CLI Reference

This documentation is generated from the CLI source code. Last updated: {}.

## Overview

`miro-migrate` moves the Miro image archive into the storage service and
registers the images with DLCS. The pipeline runs as separate, restartable
stages; each stage reads its pending work from the index database.

## Typical run

```bash
# Build the source indices from the upstream exports in $MIGRATION_DATA_DIR
miro-migrate create-sourcedata-index
miro-migrate create-files-index
miro-migrate create-decisions-index

# Derive chunks and registrations
miro-migrate create-chunks-index
miro-migrate create-registrations-index

# Package and hand off to the storage service
miro-migrate transfer-package-chunks
miro-migrate upload-transfer-packages --limit 100

# Register with DLCS, then poll for results
miro-migrate dlcs-send-registrations --limit 5
miro-migrate dlcs-update-registrations --limit 50

# See where things stand
miro-migrate index-status
```

## Commands

{}

## Environment Variables

- `MIGRATION_DATA_DIR` - Exports, index database and snapshots (default: `./data`)
- `MIGRATION_INDEX_DB` - Index database path (default: `$MIGRATION_DATA_DIR/indices.db`)
- `MIGRATION_CHUNK_SIZE` - Source objects per transfer package (default: `1000`)
- `DLCS_BATCH_SIZE` - Registrations per DLCS batch (default: `10`)
- `STORAGE_TOKEN_URL`, `STORAGE_CLIENT_ID`, `STORAGE_CLIENT_SECRET` - Storage service credentials
- `DLCS_API_KEY`, `DLCS_API_SECRET` - DLCS credentials
- `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT` - Logging (see `miro_common::logging`)

---

*Generated by `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
