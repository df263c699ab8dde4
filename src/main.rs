//! # Legal Lens CLI (`lens`)
//!
//! ## Usage
//!
//! ```bash
//! lens --config ./config/lens.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lens init` | Create the SQLite index schema |
//! | `lens chunk <pdf>` | Print a PDF's chunks as JSON (no config needed) |
//! | `lens ingest <pdf>` | Store, chunk, embed, and index a PDF |
//! | `lens seed <dir>` | Index `*.txt` reference files for a category |
//! | `lens ask "<question>"` | Answer a question over selected documents |
//! | `lens delete <doc_id>` | Remove a document from the index |
//! | `lens serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! lens init
//! lens seed ./reference/loan --category loan
//! lens ingest ./agreement.pdf --user-id alice --category loan
//! lens ask --user-id alice --doc 3f2c9a1e-... --category loan "When is the first repayment due?"
//! RUST_LOG=legal_lens=debug lens serve
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use legal_lens::ask::{answer_question, AskRequest};
use legal_lens::config::{self, Config};
use legal_lens::extract::extract_pages;
use legal_lens::ingest::{delete_document, ingest_document, seed_category, UploadRequest};
use legal_lens::migrate;
use legal_lens::server;
use legal_lens::services::Services;
use legal_lens_core::chunk::chunk_pages;

/// Legal Lens: question answering over legal documents.
#[derive(Parser)]
#[command(name = "lens", version, about = "Legal Lens: retrieval-grounded answers over legal PDFs")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lens.toml")]
    config: PathBuf,

    /// Log at debug level. `RUST_LOG` takes precedence when set.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the index schema. Safe to re-run.
    Init,

    /// Extract and chunk a PDF, printing the chunks as JSON.
    Chunk {
        /// Path to the PDF.
        pdf: PathBuf,
    },

    /// Ingest a PDF for a user.
    Ingest {
        pdf: PathBuf,

        #[arg(long)]
        user_id: String,

        /// Category label, e.g. `loan` or `lease`.
        #[arg(long)]
        category: String,
    },

    /// Seed category reference material from a directory of `.txt` files.
    Seed {
        dir: PathBuf,

        #[arg(long)]
        category: String,
    },

    /// Ask a question over one or more ingested documents.
    Ask {
        question: String,

        #[arg(long)]
        user_id: String,

        /// Document id to search. Repeat for several documents.
        #[arg(long = "doc", required = true)]
        docs: Vec<String>,

        #[arg(long)]
        category: String,

        /// Print the full response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete a document's vectors, and its stored original when `--user-id` is given.
    Delete {
        doc_id: String,

        #[arg(long)]
        user_id: Option<String>,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Commands that don't require config
    if let Commands::Chunk { pdf } = &cli.command {
        let bytes =
            std::fs::read(pdf).with_context(|| format!("Failed to read {}", pdf.display()))?;
        let pages = extract_pages(&bytes)?;
        let chunks = chunk_pages(&pages);
        println!("{}", serde_json::to_string_pretty(&chunks)?);
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Chunk { .. } => {}
        Commands::Init => init(&cfg).await?,
        Commands::Ingest {
            pdf,
            user_id,
            category,
        } => {
            let services = Services::from_config(&cfg).await?;
            let bytes =
                std::fs::read(&pdf).with_context(|| format!("Failed to read {}", pdf.display()))?;
            let filename = pdf
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "upload.pdf".to_string());

            let report = ingest_document(
                &services,
                UploadRequest {
                    user_id,
                    category,
                    filename,
                    bytes,
                },
            )
            .await?;

            println!("doc_id: {}", report.doc_id);
            println!("chunks: {}", report.chunks_count);
            if report.embeddings_degraded {
                println!("warning: indexed with fallback vectors (embedding provider unavailable)");
            }
        }
        Commands::Seed { dir, category } => {
            let services = Services::from_config(&cfg).await?;
            let report = seed_category(&services, &category, &dir).await?;
            println!(
                "Seeded category '{}': {} files, {} chunks",
                category, report.files, report.chunks
            );
            if report.degraded_files > 0 {
                println!(
                    "warning: {} files indexed with fallback vectors",
                    report.degraded_files
                );
            }
        }
        Commands::Ask {
            question,
            user_id,
            docs,
            category,
            json,
        } => {
            let services = Services::from_config(&cfg).await?;
            let request = AskRequest {
                user_id,
                doc_ids: docs,
                question,
                category,
            };
            let response = answer_question(&services, &request).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", response.answer);
                println!();
                println!(
                    "confidence: {:.2}{}",
                    response.confidence,
                    if response.used_category {
                        " (category context consulted)"
                    } else {
                        ""
                    }
                );
                for (i, s) in response.sources.iter().enumerate() {
                    println!(
                        "{}. [{}] {} chunk {} pages {} ({:.2})",
                        i + 1,
                        s.source,
                        s.doc_id,
                        s.chunk_id,
                        s.page_range,
                        s.similarity
                    );
                }
            }
        }
        Commands::Delete { doc_id, user_id } => {
            let services = Services::from_config(&cfg).await?;
            let removed = delete_document(&services, &doc_id, user_id.as_deref()).await?;
            println!("Deleted {} vectors for {}", removed, doc_id);
        }
        Commands::Serve => server::run_server(&cfg).await?,
    }

    Ok(())
}

async fn init(cfg: &Config) -> anyhow::Result<()> {
    if cfg.index.backend != "sqlite" {
        println!("Index backend '{}' needs no initialization.", cfg.index.backend);
        return Ok(());
    }
    migrate::run_migrations(cfg).await?;
    println!("Index initialized at {}", cfg.index.path.display());
    Ok(())
}
