//! Source-store contract and the pooled Postgres implementation.
//!
//! Extraction queries are opaque text owned by the sync jobs; this crate only
//! runs them over a pooled connection and decodes the wide result rows into
//! [`SourceRow`] values with lowercase column names.

use async_trait::async_trait;
use bigdecimal::ToPrimitive;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use otb_core::{Scalar, SourceRow};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::BigDecimal;
use sqlx::{Column, Row, TypeInfo};
use thiserror::Error;
use tracing::debug;

pub const CRATE_NAME: &str = "otb-source";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("connecting to source store: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("source query failed: {0}")]
    Query(#[source] sqlx::Error),
    #[error("decoding source column {column}: {source}")]
    Decode {
        column: String,
        #[source]
        source: sqlx::Error,
    },
}

/// Narrow extraction contract over the analytical source store.
#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn query(&self, sql: &str) -> Result<Vec<SourceRow>, SourceError>;
}

/// Pooled Postgres-backed source store.
#[derive(Debug, Clone)]
pub struct PgSourceStore {
    pool: sqlx::PgPool,
}

impl PgSourceStore {
    pub async fn connect(database_url: &str) -> Result<Self, SourceError> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await
            .map_err(SourceError::Connect)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SourceStore for PgSourceStore {
    async fn query(&self, sql: &str) -> Result<Vec<SourceRow>, SourceError> {
        // Scoped acquisition: the connection returns to the pool on every
        // exit path, including query failure.
        let mut conn = self.pool.acquire().await.map_err(SourceError::Connect)?;
        let rows = sqlx::query(sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(SourceError::Query)?;
        debug!(rows = rows.len(), "source query returned");
        rows.iter().map(decode_row).collect()
    }
}

fn decode_row(row: &PgRow) -> Result<SourceRow, SourceError> {
    let mut pairs = Vec::with_capacity(row.len());
    for column in row.columns() {
        let idx = column.ordinal();
        let name = column.name().to_string();
        let scalar = decode_scalar(row, idx, column.type_info().name()).map_err(|source| {
            SourceError::Decode {
                column: name.clone(),
                source,
            }
        })?;
        pairs.push((name, scalar));
    }
    Ok(SourceRow::from_pairs(pairs))
}

fn decode_scalar(row: &PgRow, idx: usize, type_name: &str) -> Result<Scalar, sqlx::Error> {
    let scalar = match type_name {
        "INT2" => row
            .try_get::<Option<i16>, _>(idx)?
            .map(|v| Scalar::Number(f64::from(v))),
        "INT4" => row
            .try_get::<Option<i32>, _>(idx)?
            .map(|v| Scalar::Number(f64::from(v))),
        "INT8" => row
            .try_get::<Option<i64>, _>(idx)?
            .map(|v| Scalar::Number(v as f64)),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(idx)?
            .map(|v| Scalar::Number(f64::from(v))),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(idx)?
            .map(Scalar::Number),
        "NUMERIC" => row
            .try_get::<Option<BigDecimal>, _>(idx)?
            .map(|v| Scalar::Number(v.to_f64().unwrap_or(0.0))),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(idx)?
            .map(|v| Scalar::Text(v.format("%Y-%m-%d").to_string())),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(idx)?
            .map(|v| Scalar::Text(v.format("%Y-%m-%d %H:%M:%S").to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)?
            .map(|v| Scalar::Text(v.to_rfc3339())),
        "BOOL" => row
            .try_get::<Option<bool>, _>(idx)?
            .map(|v| Scalar::Number(if v { 1.0 } else { 0.0 })),
        _ => row
            .try_get::<Option<String>, _>(idx)?
            .map(Scalar::Text),
    };
    Ok(scalar.unwrap_or(Scalar::Null))
}
