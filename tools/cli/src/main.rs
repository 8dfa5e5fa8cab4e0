//! docvault CLI - serve the vault API or run one-shot vault operations.
//!
//! Configuration comes from `VAULT_*` environment variables; see
//! `VaultConfig::from_env`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use docvault_common::VaultAddress;
use docvault_vault::{build_service, ScanReport, VaultConfig, VaultService};

#[derive(Parser)]
#[command(name = "docvault")]
#[command(about = "docvault - encrypted sensitive-document vault")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the vault HTTP server.
    Serve {
        /// Address to bind.
        #[arg(short, long, default_value = "127.0.0.1:8080")]
        bind: String,
    },

    /// Store a file in the vault.
    Store {
        /// Source document identifier.
        #[arg(short, long)]
        id: String,

        /// File to store.
        #[arg(short, long)]
        source: PathBuf,
    },

    /// Retrieve a document by vault path.
    Retrieve {
        /// Vault path, e.g. bucket://documents/....
        vault_path: String,

        /// Write content to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List vault documents.
    List {
        /// Path prefix filter.
        #[arg(short, long)]
        prefix: Option<String>,

        /// Maximum entries.
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },

    /// Delete a document by vault path.
    Delete {
        /// Vault path to delete.
        vault_path: String,
    },

    /// Show vault statistics.
    Stats,

    /// Migrate a flagged file into the vault.
    Migrate {
        /// Source document identifier.
        #[arg(short, long)]
        id: String,

        /// File to migrate.
        #[arg(short, long)]
        source: PathBuf,

        /// Classifier finding count for the file.
        #[arg(short, long, default_value_t = 1)]
        findings: u32,
    },
}

async fn build() -> Result<Arc<VaultService>> {
    let config = VaultConfig::from_env().context("Invalid vault configuration")?;
    let service = build_service(config).context("Could not assemble vault service")?;
    Ok(Arc::new(service))
}

fn file_name_of(path: &PathBuf) -> Result<String> {
    Ok(path
        .file_name()
        .context("Source path has no file name")?
        .to_string_lossy()
        .into_owned())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match cli.command {
        Commands::Serve { bind } => {
            let service = build().await?;
            docvault_server::serve(&bind, service)
                .await
                .context("Server failed")?;
        }

        Commands::Store { id, source } => {
            let service = build().await?;
            service.bootstrap().await?;

            let name = file_name_of(&source)?;
            let content = std::fs::read(&source)
                .with_context(|| format!("Could not read {}", source.display()))?;

            let outcome = service.store(&id, &name, &content, BTreeMap::new()).await?;
            for record in &outcome.records {
                println!("{}", record.address);
            }
            for failure in &outcome.failures {
                eprintln!("failed: {}: {}", failure.backend, failure.error);
            }
        }

        Commands::Retrieve { vault_path, output } => {
            let service = build().await?;
            let address = VaultAddress::parse(&vault_path)?;
            let document = service.retrieve(&address).await?;

            match output {
                Some(path) => {
                    std::fs::write(&path, &document.content)
                        .with_context(|| format!("Could not write {}", path.display()))?;
                    println!(
                        "Wrote {} bytes to {}",
                        document.content.len(),
                        path.display()
                    );
                }
                None => {
                    use std::io::Write;
                    std::io::stdout().write_all(&document.content)?;
                }
            }
        }

        Commands::List { prefix, limit } => {
            let service = build().await?;
            let listing = service.list(prefix.as_deref(), limit).await?;

            for record in &listing.records {
                println!(
                    "{}\t{}\t{}\t{}",
                    record.address,
                    record.metadata.source_id,
                    record.size,
                    if record.metadata.encrypted {
                        "encrypted"
                    } else {
                        "plaintext"
                    }
                );
            }
            for failure in &listing.failures {
                eprintln!("backend {} failed: {}", failure.backend, failure.error);
            }
        }

        Commands::Delete { vault_path } => {
            let service = build().await?;
            let address = VaultAddress::parse(&vault_path)?;
            service.delete(&address).await?;
            println!("Deleted {}", address);
        }

        Commands::Stats => {
            let service = build().await?;
            let stats = service.statistics().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        Commands::Migrate {
            id,
            source,
            findings,
        } => {
            let service = build().await?;
            service.bootstrap().await?;

            let name = file_name_of(&source)?;
            let content = std::fs::read(&source)
                .with_context(|| format!("Could not read {}", source.display()))?;

            let outcome = service
                .migrate_sensitive(&id, &name, &content, &ScanReport::with_count(findings), None)
                .await?;

            println!("{}", outcome.store.primary().address);
            println!("sha256: {}", outcome.file_hash);
        }
    }

    Ok(())
}
