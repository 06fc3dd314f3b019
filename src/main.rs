//! Command-line interface for film-sync
//!
//! # Usage Examples
//!
//! ```bash
//! # Sync forever, one pass every 15 minutes
//! film-sync run \
//!   --db-name movies_database --db-user app --db-password secret \
//!   --elastic-host localhost --state-file-path state/state.json
//!
//! # Single pass, rejecting batches with failed documents
//! film-sync run --once --strict-bulk ...
//!
//! # Create the index if it does not exist
//! film-sync provision --elastic-host localhost --elastic-index movies
//!
//! # Show stored checkpoints
//! film-sync checkpoints --state-file-path state/state.json
//! ```
//!
//! Every option can also be set through its environment variable (`DB_HOST`,
//! `ELASTIC_INDEX`, `STATE_FILE_PATH`, ...), including from a `.env` file in
//! the working directory.

use anyhow::Context;
use checkpoint::{CheckpointLedger, JsonFileStore};
use clap::{Parser, Subcommand};
use film_sync::{ElasticOpts, PostgresOpts, Schedule, ScheduleOpts, StateOpts};
use film_sync_elasticsearch_sink::{ElasticConfig, ElasticsearchSink};
use film_sync_postgresql_source::{PostgresRepository, SourceOpts};
use index_sink::IndexSink;
use sync_backoff::RetryPolicy;
use sync_core::Stream;

#[derive(Parser)]
#[command(name = "film-sync")]
#[command(about = "Incremental sync of the film catalog from PostgreSQL into Elasticsearch")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync changed film works, persons and genres into the index
    Run {
        #[command(flatten)]
        pg: PostgresOpts,

        #[command(flatten)]
        elastic: ElasticOpts,

        #[command(flatten)]
        state: StateOpts,

        #[command(flatten)]
        schedule: ScheduleOpts,

        /// Fail the pass when any document of a batch is rejected
        #[arg(long, env = "ELASTIC_STRICT_BULK")]
        strict_bulk: bool,
    },

    /// Create the index with its mapping if it does not exist
    Provision {
        #[command(flatten)]
        elastic: ElasticOpts,
    },

    /// Print the stored checkpoints of every stream
    Checkpoints {
        #[command(flatten)]
        state: StateOpts,

        /// Print as a JSON object keyed by stream
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment may be set otherwise.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            pg,
            elastic,
            state,
            schedule,
            strict_bulk,
        } => {
            let config = ElasticConfig::from(&elastic).with_strict(strict_bulk);
            let sink = ElasticsearchSink::new(config)?;
            let ledger = CheckpointLedger::new(JsonFileStore::new(&state.state_file_path));
            let source_opts = SourceOpts::from(&pg);
            let admission = RetryPolicy::admission();

            tracing::info!(
                index = %elastic.elastic_index,
                state_file = %state.state_file_path.display(),
                "Starting film-sync"
            );

            film_sync::run_with(
                || PostgresRepository::connect(&source_opts, &admission),
                &ledger,
                &sink,
                Schedule::from(&schedule),
            )
            .await?;
        }
        Commands::Provision { elastic } => {
            let sink = ElasticsearchSink::new(ElasticConfig::from(&elastic))?;
            sink.provision()
                .await
                .with_context(|| format!("Failed to provision index {}", elastic.elastic_index))?;
            println!("Index {} is ready", elastic.elastic_index);
        }
        Commands::Checkpoints { state, json } => {
            let ledger = CheckpointLedger::new(JsonFileStore::new(&state.state_file_path));
            let mut all = serde_json::Map::new();
            for stream in Stream::ALL {
                let checkpoints = ledger.load(stream.as_str()).await?;
                if json {
                    all.insert(
                        stream.to_string(),
                        serde_json::json!({
                            "committed": checkpoints.committed.encode(),
                            "in_flight_root": checkpoints.in_flight_root.encode(),
                            "in_flight_related": checkpoints.in_flight_related.encode(),
                        }),
                    );
                } else {
                    println!(
                        "{stream}: committed={} in_flight_root={} in_flight_related={}",
                        checkpoints.committed,
                        checkpoints.in_flight_root,
                        checkpoints.in_flight_related
                    );
                }
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&all)?);
            }
        }
    }

    Ok(())
}
