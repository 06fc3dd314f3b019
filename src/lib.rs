//! film-sync library
//!
//! Keeps an Elasticsearch index of denormalized film work documents in step
//! with a PostgreSQL film catalog.
//!
//! # Workspace crates
//!
//! - `sync_backoff` - exponential backoff retry policy
//! - `sync_core` - source rows, index documents and document assembly
//! - `checkpoint` - checkpoint stores and the cascade checkpoint ledger
//! - `index_sink` - the search index sink trait
//! - `film_sync_elasticsearch_sink` - Elasticsearch sink over HTTP
//! - `film_sync_postgresql_source` - PostgreSQL queries and the change detector
//!
//! # CLI Usage
//!
//! ```bash
//! # Sync every 15 minutes, forever
//! film-sync run --db-host localhost --db-name movies_database \
//!   --db-user app --db-password secret \
//!   --elastic-host localhost --state-file-path state/state.json
//!
//! # Single pass
//! film-sync run --once ...
//!
//! # Create the index if missing
//! film-sync provision --elastic-host localhost
//!
//! # Inspect stored checkpoints
//! film-sync checkpoints --state-file-path state/state.json
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub mod interval;
pub mod sync;

pub use sync::{run_pass, run_with, PassReport, Schedule};

use film_sync_elasticsearch_sink::ElasticConfig;
use film_sync_postgresql_source::SourceOpts;

/// PostgreSQL connection options
#[derive(Parser, Clone, Debug)]
pub struct PostgresOpts {
    /// PostgreSQL host
    #[arg(long, default_value = "localhost", env = "DB_HOST")]
    pub db_host: String,

    /// PostgreSQL port
    #[arg(long, default_value = "5432", env = "DB_PORT")]
    pub db_port: u16,

    /// Database name
    #[arg(long, env = "DB_NAME")]
    pub db_name: String,

    /// Database user
    #[arg(long, env = "DB_USER")]
    pub db_user: String,

    /// Database password
    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    pub db_password: String,

    /// Schema holding the film catalog tables
    #[arg(long, default_value = "content", env = "DB_SCHEMA")]
    pub db_schema: String,
}

impl From<&PostgresOpts> for SourceOpts {
    fn from(opts: &PostgresOpts) -> Self {
        Self {
            host: opts.db_host.clone(),
            port: opts.db_port,
            dbname: opts.db_name.clone(),
            user: opts.db_user.clone(),
            password: opts.db_password.clone(),
            schema: opts.db_schema.clone(),
        }
    }
}

/// Elasticsearch connection options
#[derive(Parser, Clone, Debug)]
pub struct ElasticOpts {
    /// Elasticsearch URL scheme
    #[arg(long, default_value = "http", env = "ELASTIC_SCHEME")]
    pub elastic_scheme: String,

    /// Elasticsearch host
    #[arg(long, default_value = "localhost", env = "ELASTIC_HOST")]
    pub elastic_host: String,

    /// Elasticsearch port
    #[arg(long, default_value = "9200", env = "ELASTIC_PORT")]
    pub elastic_port: u16,

    /// Name of the film works index
    #[arg(long, default_value = "movies", env = "ELASTIC_INDEX")]
    pub elastic_index: String,
}

impl ElasticOpts {
    pub fn url(&self) -> String {
        format!(
            "{}://{}:{}",
            self.elastic_scheme, self.elastic_host, self.elastic_port
        )
    }
}

impl From<&ElasticOpts> for ElasticConfig {
    fn from(opts: &ElasticOpts) -> Self {
        ElasticConfig::new(opts.url(), opts.elastic_index.clone())
    }
}

/// Checkpoint file options
#[derive(Parser, Clone, Debug)]
pub struct StateOpts {
    /// JSON file holding the sync checkpoints
    #[arg(long, default_value = "state.json", env = "STATE_FILE_PATH")]
    pub state_file_path: PathBuf,
}

/// Pass scheduling options
#[derive(Parser, Clone, Debug)]
pub struct ScheduleOpts {
    /// Run a single pass and exit
    #[arg(long)]
    pub once: bool,

    /// Time between the starts of two passes ("900", "900s", "15m", "1h")
    #[arg(
        long,
        default_value = "15m",
        env = "SYNC_INTERVAL",
        value_parser = interval::parse_interval
    )]
    pub interval: Duration,
}

impl From<&ScheduleOpts> for Schedule {
    fn from(opts: &ScheduleOpts) -> Self {
        Self {
            interval: opts.interval,
            once: opts.once,
        }
    }
}
