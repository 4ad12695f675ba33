//! Sink-store REST client and the full-replace table replacer.
//!
//! The sink exposes table-oriented REST operations (PostgREST conventions).
//! Every operation returns an error value instead of panicking, and a missing
//! configuration degrades the whole surface to logged no-ops.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub const CRATE_NAME: &str = "otb-sink";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("sink returned {status} for {table}: {body}")]
    Status {
        status: u16,
        table: String,
        body: String,
    },
}

/// Table-oriented sink contract, kept narrow so tests can substitute fakes.
#[async_trait]
pub trait SinkStore: Send + Sync {
    /// Delete every row of `table` unconditionally.
    async fn delete_all(&self, table: &str) -> Result<(), SinkError>;
    async fn insert(&self, table: &str, records: &[JsonValue]) -> Result<(), SinkError>;
    async fn select(
        &self,
        table: &str,
        columns: &str,
        limit: u32,
    ) -> Result<Vec<JsonValue>, SinkError>;
}

#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub base_url: String,
    pub service_key: String,
}

impl SinkConfig {
    /// Missing credentials are not an error: the replicator runs source-only
    /// and every sink call becomes a no-op.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("OTB_SINK_URL").ok()?;
        let service_key = std::env::var("OTB_SINK_SERVICE_KEY").ok()?;
        Some(Self {
            base_url,
            service_key,
        })
    }
}

/// PostgREST-style HTTP client for the sink store.
#[derive(Debug, Clone)]
pub struct RestSinkClient {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl RestSinkClient {
    pub fn new(config: SinkConfig) -> Result<Self, SinkError> {
        let http = reqwest::Client::builder().gzip(true).brotli(true).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            service_key: config.service_key,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn check(resp: reqwest::Response, table: &str) -> Result<reqwest::Response, SinkError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(SinkError::Status {
            status: status.as_u16(),
            table: table.to_string(),
            body,
        })
    }
}

#[async_trait]
impl SinkStore for RestSinkClient {
    async fn delete_all(&self, table: &str) -> Result<(), SinkError> {
        // PostgREST refuses an unfiltered delete; `id=neq.0` matches all rows.
        let url = format!("{}?id=neq.0", self.table_url(table));
        let resp = self
            .authorize(self.http.delete(url))
            .header("Prefer", "return=minimal")
            .send()
            .await?;
        Self::check(resp, table).await.map(|_| ())
    }

    async fn insert(&self, table: &str, records: &[JsonValue]) -> Result<(), SinkError> {
        let resp = self
            .authorize(self.http.post(self.table_url(table)))
            .header("Prefer", "return=minimal")
            .json(records)
            .send()
            .await?;
        Self::check(resp, table).await.map(|_| ())
    }

    async fn select(
        &self,
        table: &str,
        columns: &str,
        limit: u32,
    ) -> Result<Vec<JsonValue>, SinkError> {
        let url = format!("{}?select={}&limit={}", self.table_url(table), columns, limit);
        let resp = self.authorize(self.http.get(url)).send().await?;
        let resp = Self::check(resp, table).await?;
        Ok(resp.json().await?)
    }
}

/// Outcome of one replacement attempt, reported instead of thrown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// Sink unconfigured or nothing to write.
    Skipped,
    Replaced(usize),
    Failed,
}

impl ReplaceOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ReplaceOutcome::Failed)
    }

    pub fn rows(&self) -> usize {
        match self {
            ReplaceOutcome::Replaced(n) => *n,
            _ => 0,
        }
    }
}

/// Full-replace writer: delete everything, then insert the fresh snapshot.
///
/// Writes to the same table are serialized behind a per-table mutex so a
/// scheduled run racing a manual trigger cannot interleave its delete with
/// the other writer's insert. Readers may still observe the brief empty
/// window between the two steps.
pub struct SinkReplacer {
    store: Option<Arc<dyn SinkStore>>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SinkReplacer {
    pub fn new(store: Option<Arc<dyn SinkStore>>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn unconfigured() -> Self {
        Self::new(None)
    }

    pub fn is_configured(&self) -> bool {
        self.store.is_some()
    }

    pub fn store(&self) -> Option<&Arc<dyn SinkStore>> {
        self.store.as_ref()
    }

    async fn table_lock(&self, table: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(table.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn replace(&self, table: &str, records: &[JsonValue]) -> ReplaceOutcome {
        let Some(store) = &self.store else {
            debug!(table, "sink replace skipped: sink not configured");
            return ReplaceOutcome::Skipped;
        };
        if records.is_empty() {
            debug!(table, "sink replace skipped: no records");
            return ReplaceOutcome::Skipped;
        }

        let lock = self.table_lock(table).await;
        let _guard = lock.lock().await;

        if let Err(err) = store.delete_all(table).await {
            // Best effort: a failed delete still gets the fresh insert.
            warn!(table, error = %err, "sink delete failed before insert");
        }
        match store.insert(table, records).await {
            Ok(()) => {
                info!(table, rows = records.len(), "sink table replaced");
                ReplaceOutcome::Replaced(records.len())
            }
            Err(err) => {
                let sample = records
                    .first()
                    .map(|r| r.to_string())
                    .unwrap_or_default();
                error!(table, error = %err, sample, "sink insert failed");
                ReplaceOutcome::Failed
            }
        }
    }

    pub async fn replace_one(&self, table: &str, record: JsonValue) -> ReplaceOutcome {
        self.replace(table, std::slice::from_ref(&record)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    /// Recording fake that can be told to fail either step.
    #[derive(Default)]
    struct RecordingSink {
        pub calls: StdMutex<Vec<String>>,
        pub rows: StdMutex<HashMap<String, Vec<JsonValue>>>,
        pub fail_delete: bool,
        pub fail_insert: bool,
    }

    impl RecordingSink {
        fn log(&self, entry: String) {
            self.calls.lock().unwrap().push(entry);
        }
    }

    #[async_trait]
    impl SinkStore for RecordingSink {
        async fn delete_all(&self, table: &str) -> Result<(), SinkError> {
            self.log(format!("delete:{table}"));
            if self.fail_delete {
                return Err(SinkError::Status {
                    status: 500,
                    table: table.to_string(),
                    body: "boom".into(),
                });
            }
            self.rows.lock().unwrap().remove(table);
            Ok(())
        }

        async fn insert(&self, table: &str, records: &[JsonValue]) -> Result<(), SinkError> {
            self.log(format!("insert:{table}:{}", records.len()));
            if self.fail_insert {
                return Err(SinkError::Status {
                    status: 400,
                    table: table.to_string(),
                    body: "bad payload".into(),
                });
            }
            self.rows
                .lock()
                .unwrap()
                .entry(table.to_string())
                .or_default()
                .extend_from_slice(records);
            Ok(())
        }

        async fn select(
            &self,
            table: &str,
            _columns: &str,
            _limit: u32,
        ) -> Result<Vec<JsonValue>, SinkError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .get(table)
                .cloned()
                .unwrap_or_default())
        }
    }

    fn records() -> Vec<JsonValue> {
        vec![json!({"id": 1, "rn": 10}), json!({"id": 2, "rn": 20})]
    }

    #[tokio::test]
    async fn replace_is_delete_then_insert() {
        let sink = Arc::new(RecordingSink::default());
        let replacer = SinkReplacer::new(Some(sink.clone() as Arc<dyn SinkStore>));

        let outcome = replacer.replace("monthly_data", &records()).await;
        assert_eq!(outcome, ReplaceOutcome::Replaced(2));
        assert_eq!(
            *sink.calls.lock().unwrap(),
            vec!["delete:monthly_data".to_string(), "insert:monthly_data:2".to_string()]
        );
    }

    #[tokio::test]
    async fn repeated_replace_leaves_exactly_one_snapshot() {
        let sink = Arc::new(RecordingSink::default());
        let replacer = SinkReplacer::new(Some(sink.clone() as Arc<dyn SinkStore>));

        replacer.replace("monthly_data", &records()).await;
        replacer.replace("monthly_data", &records()).await;

        let stored = sink.select("monthly_data", "*", 100).await.unwrap();
        assert_eq!(stored, records());
    }

    #[tokio::test]
    async fn empty_record_set_is_a_noop() {
        let sink = Arc::new(RecordingSink::default());
        let replacer = SinkReplacer::new(Some(sink.clone() as Arc<dyn SinkStore>));

        assert_eq!(replacer.replace("t", &[]).await, ReplaceOutcome::Skipped);
        assert!(sink.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unconfigured_sink_skips_without_calls() {
        let replacer = SinkReplacer::unconfigured();
        assert_eq!(
            replacer.replace("t", &records()).await,
            ReplaceOutcome::Skipped
        );
        assert!(!replacer.is_configured());
    }

    #[tokio::test]
    async fn delete_failure_does_not_abort_insert() {
        let sink = Arc::new(RecordingSink {
            fail_delete: true,
            ..RecordingSink::default()
        });
        let replacer = SinkReplacer::new(Some(sink.clone() as Arc<dyn SinkStore>));

        let outcome = replacer.replace("t", &records()).await;
        assert_eq!(outcome, ReplaceOutcome::Replaced(2));
        assert_eq!(
            *sink.calls.lock().unwrap(),
            vec!["delete:t".to_string(), "insert:t:2".to_string()]
        );
    }

    #[tokio::test]
    async fn insert_failure_is_reported_not_thrown() {
        let sink = Arc::new(RecordingSink {
            fail_insert: true,
            ..RecordingSink::default()
        });
        let replacer = SinkReplacer::new(Some(sink as Arc<dyn SinkStore>));

        assert_eq!(replacer.replace("t", &records()).await, ReplaceOutcome::Failed);
    }

    #[tokio::test]
    async fn replace_one_wraps_a_single_record() {
        let sink = Arc::new(RecordingSink::default());
        let replacer = SinkReplacer::new(Some(sink.clone() as Arc<dyn SinkStore>));

        let outcome = replacer
            .replace_one("annual_target", json!({"total_revenue_2026": 5.0}))
            .await;
        assert_eq!(outcome, ReplaceOutcome::Replaced(1));
        let stored = sink.select("annual_target", "*", 10).await.unwrap();
        assert_eq!(stored.len(), 1);
    }
}
