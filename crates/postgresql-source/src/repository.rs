use anyhow::{Context, Result};
use checkpoint::Watermark;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sync_backoff::RetryPolicy;
use sync_core::{ChangedRow, FilmWorkColumns, JoinedRow, Stream};
use tokio_postgres::{Client, NoTls, Row};
use uuid::Uuid;

use crate::{queries, SourceRepository, PAGE_SIZE};

/// PostgreSQL connection options
#[derive(Clone, Debug)]
pub struct SourceOpts {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Schema holding the catalog tables.
    pub schema: String,
}

/// [`SourceRepository`] over one `tokio-postgres` connection.
///
/// The connection lives as long as the repository; dropping it closes the
/// connection.
pub struct PostgresRepository {
    client: Client,
    schema: String,
    page_size: usize,
}

impl PostgresRepository {
    /// Connect, retrying per `policy` until the server accepts us.
    pub async fn connect(opts: &SourceOpts, policy: &RetryPolicy) -> Result<Self> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&opts.host)
            .port(opts.port)
            .dbname(&opts.dbname)
            .user(&opts.user)
            .password(&opts.password)
            .application_name("film-sync");

        tracing::debug!(
            host = %opts.host,
            port = opts.port,
            dbname = %opts.dbname,
            "Connecting to PostgreSQL"
        );

        let repository = Self::connect_with_config(&config, &opts.schema, policy).await?;
        tracing::info!(host = %opts.host, dbname = %opts.dbname, "Connected to PostgreSQL");
        Ok(repository)
    }

    /// Connect with a prepared `tokio_postgres::Config`, e.g. one parsed
    /// from a connection string.
    pub async fn connect_with_config(
        config: &tokio_postgres::Config,
        schema: &str,
        policy: &RetryPolicy,
    ) -> Result<Self> {
        queries::validate_schema(schema)?;

        let mut attempt = 0u32;
        let (client, connection) = policy
            .retry(|| {
                attempt += 1;
                let config = config.clone();
                async move {
                    let result = config.connect(NoTls).await;
                    if let Err(e) = &result {
                        tracing::warn!(attempt, "Failed to connect to PostgreSQL: {e}");
                    }
                    result
                }
            })
            .await
            .context("Failed to connect to PostgreSQL")?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {e}");
            }
        });

        Ok(Self {
            client,
            schema: schema.to_string(),
            page_size: PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn limit(&self) -> i64 {
        i64::try_from(self.page_size).unwrap_or(i64::MAX)
    }
}

fn changed_row(row: &Row) -> Result<ChangedRow> {
    Ok(ChangedRow {
        id: row.try_get(0)?,
        modified: row.try_get(1)?,
    })
}

/// `film_work.rating` is `numeric(3,1)`; the index stores it as a float.
fn rating_to_f64(rating: Option<Decimal>) -> Option<f64> {
    rating.and_then(|value| value.to_f64())
}

fn joined_row(row: &Row) -> Result<JoinedRow> {
    let film = FilmWorkColumns {
        id: row.try_get(0)?,
        title: row.try_get(1)?,
        description: row.try_get(2)?,
        rating: rating_to_f64(row.try_get::<_, Option<Decimal>>(3)?),
        kind: row.try_get(4)?,
        created: row.try_get::<_, Option<DateTime<Utc>>>(5)?,
        modified: row.try_get(6)?,
    };
    let role: Option<String> = row.try_get(7)?;

    Ok(JoinedRow::from_nullable(
        film,
        role.as_deref(),
        row.try_get(8)?,
        row.try_get(9)?,
        row.try_get(10)?,
        row.try_get(11)?,
    ))
}

#[async_trait::async_trait]
impl SourceRepository for PostgresRepository {
    async fn changed_roots(&self, stream: Stream, after: Watermark) -> Result<Vec<ChangedRow>> {
        let sql = queries::changed_roots(&self.schema, stream);
        let modified = after.modified();
        let id = after.id();
        let rows = self
            .client
            .query(&sql, &[&modified, &id, &self.limit()])
            .await
            .with_context(|| format!("Failed to query changed {stream} rows after {after}"))?;

        rows.iter().map(changed_row).collect()
    }

    async fn affected_film_works(
        &self,
        stream: Stream,
        root_ids: &[Uuid],
        after: Watermark,
    ) -> Result<Vec<ChangedRow>> {
        let link = stream
            .link()
            .with_context(|| format!("Stream {stream} has no link table to film works"))?;
        let sql = queries::affected_film_works(&self.schema, link);
        let modified = after.modified();
        let id = after.id();
        let rows = self
            .client
            .query(&sql, &[&root_ids, &modified, &id, &self.limit()])
            .await
            .with_context(|| format!("Failed to query film works affected by {stream} changes"))?;

        rows.iter().map(changed_row).collect()
    }

    async fn joined_rows(&self, film_work_ids: &[Uuid]) -> Result<Vec<JoinedRow>> {
        let sql = queries::joined_rows(&self.schema);
        let rows = self
            .client
            .query(&sql, &[&film_work_ids])
            .await
            .with_context(|| {
                format!("Failed to query details of {} film works", film_work_ids.len())
            })?;

        rows.iter().map(joined_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_numeric_rating_becomes_float() {
        assert_eq!(rating_to_f64(Decimal::from_str("8.1").ok()), Some(8.1));
        assert_eq!(rating_to_f64(Decimal::from_str("10.0").ok()), Some(10.0));
        assert_eq!(rating_to_f64(None), None);
    }
}
