//! Hosted Postgres (Supabase) counter store
//!
//! Talks to the PostgREST API with the service role key. ureq is blocking, so
//! every request runs on the blocking pool. Increments use a compare-and-swap
//! `PATCH ... ?count=eq.<old>`: PostgREST returns the updated rows, and an
//! empty result means another writer got there first.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};
use ureq::Agent;

use super::retry::calculate_backoff;
use super::{COUNTER_ID, CounterRow, CounterStore, VisitorRecord, next_count};
use crate::config::SupabaseConfig;
use crate::errors::{CounterError, Result};

const CAS_BASE_DELAY_MS: u64 = 10;
const CAS_MAX_DELAY_MS: u64 = 250;

#[derive(Debug, Deserialize)]
struct CountOnly {
    count: i64,
}

/// Table names end up in SQL and URLs, keep them boring
fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn counter_table_ddl(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY, count BIGINT NOT NULL DEFAULT 0);",
        table
    )
}

fn visitor_table_ddl(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\
         id SERIAL PRIMARY KEY, \
         ip_address VARCHAR(255) NOT NULL, \
         city VARCHAR(255), \
         region VARCHAR(255), \
         country VARCHAR(255), \
         timestamp TIMESTAMPTZ NOT NULL);",
        table
    )
}

fn to_count(raw: i64) -> Result<u64> {
    u64::try_from(raw)
        .map_err(|_| CounterError::malformed_state(format!("stored count is negative: {}", raw)))
}

/// Thin blocking PostgREST client
struct RestClient {
    agent: Agent,
    rest_url: String,
    service_key: String,
    counter_table: String,
    visitor_table: String,
    sql_rpc: String,
}

impl RestClient {
    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    fn get(&self, url: &str) -> ureq::RequestBuilder<ureq::typestate::WithoutBody> {
        self.agent
            .get(url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Accept", "application/json")
    }

    fn with_auth(
        &self,
        request: ureq::RequestBuilder<ureq::typestate::WithBody>,
    ) -> ureq::RequestBuilder<ureq::typestate::WithBody> {
        request
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Accept", "application/json")
    }

    /// `select=*&limit=1`, only checks that the table answers
    fn check_table(&self, table: &str) -> Result<()> {
        self.get(&self.table_url(table))
            .query("select", "*")
            .query("limit", "1")
            .call()?;
        Ok(())
    }

    fn fetch_count(&self) -> Result<Option<i64>> {
        let rows: Vec<CountOnly> = self
            .get(&self.table_url(&self.counter_table))
            .query("select", "count")
            .query("id", format!("eq.{}", COUNTER_ID))
            .call()?
            .into_body()
            .read_json()?;
        Ok(rows.first().map(|r| r.count))
    }

    /// Insert the seed row unless it already exists
    fn seed_counter(&self) -> Result<()> {
        let request = self
            .agent
            .post(&self.table_url(&self.counter_table))
            .query("on_conflict", "id")
            .header("Prefer", "resolution=ignore-duplicates,return=minimal");
        self.with_auth(request)
            .send_json(vec![CounterRow::new(0)?])?;
        Ok(())
    }

    /// `Some(new)` when the row still held `old`, `None` on conflict
    fn compare_and_swap(&self, old: i64, new: i64) -> Result<Option<i64>> {
        let request = self
            .agent
            .patch(&self.table_url(&self.counter_table))
            .query("id", format!("eq.{}", COUNTER_ID))
            .query("count", format!("eq.{}", old))
            .header("Prefer", "return=representation");
        let rows: Vec<CountOnly> = self
            .with_auth(request)
            .send_json(serde_json::json!({ "count": new }))?
            .into_body()
            .read_json()?;
        Ok(rows.first().map(|r| r.count))
    }

    fn insert_visitor(&self, record: &VisitorRecord) -> Result<()> {
        let request = self
            .agent
            .post(&self.table_url(&self.visitor_table))
            .header("Prefer", "return=minimal");
        self.with_auth(request).send_json(vec![record])?;
        Ok(())
    }

    /// Run DDL through an `execute_sql(sql text)` style RPC
    fn execute_sql(&self, sql: &str) -> Result<()> {
        let request = self
            .agent
            .post(&format!("{}/rpc/{}", self.rest_url, self.sql_rpc));
        self.with_auth(request)
            .send_json(serde_json::json!({ "sql": sql }))?;
        Ok(())
    }
}

pub struct HostedStorage {
    client: Arc<RestClient>,
    max_cas_retries: u32,
}

impl HostedStorage {
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        if config.url.trim().is_empty() || config.service_key.trim().is_empty() {
            return Err(CounterError::configuration(
                "SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY must both be set",
            ));
        }

        let base = url::Url::parse(config.url.trim()).map_err(|e| {
            CounterError::configuration(format!("Invalid Supabase URL '{}': {}", config.url, e))
        })?;

        for name in [&config.counter_table, &config.visitor_table, &config.sql_rpc] {
            if !is_valid_identifier(name) {
                return Err(CounterError::configuration(format!(
                    "Invalid table or function name: '{}'",
                    name
                )));
            }
        }

        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs.max(1))))
            .build()
            .into();

        let client = RestClient {
            agent,
            rest_url: format!("{}/rest/v1", base.as_str().trim_end_matches('/')),
            service_key: config.service_key.trim().to_string(),
            counter_table: config.counter_table.clone(),
            visitor_table: config.visitor_table.clone(),
            sql_rpc: config.sql_rpc.clone(),
        };

        Ok(Self {
            client: Arc::new(client),
            max_cas_retries: config.max_cas_retries,
        })
    }

    /// Run a blocking client call on the blocking thread pool
    async fn call<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&RestClient) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let client = Arc::clone(&self.client);
        tokio::task::spawn_blocking(move || f(&client))
            .await
            .map_err(|e| {
                CounterError::storage_unavailable(format!("hosted storage task failed: {}", e))
            })?
    }

    async fn create_table(&self, table_kind: &'static str, ddl: String) -> Result<()> {
        info!("Creating {} table through the SQL RPC", table_kind);
        self.call(move |c| c.execute_sql(&ddl)).await
    }
}

#[async_trait]
impl CounterStore for HostedStorage {
    async fn ensure_initialized(&self) -> Result<()> {
        if let Err(e) = self.call(|c| c.check_table(&c.counter_table)).await {
            warn!("Counter table check failed: {}", e);
            let ddl = counter_table_ddl(&self.client.counter_table);
            self.create_table("counter", ddl).await.map_err(|rpc_err| {
                CounterError::storage_unavailable(format!(
                    "counter table is not reachable ({}) and could not be created ({})",
                    e.message(),
                    rpc_err.message()
                ))
            })?;
        }

        if self.call(|c| c.fetch_count()).await?.is_none() {
            self.call(|c| c.seed_counter()).await?;
            info!("Counter row seeded with count = 0");
        }

        // 访客表不影响计数器，建表失败只记录日志
        if let Err(e) = self.call(|c| c.check_table(&c.visitor_table)).await {
            debug!("Visitor table check failed: {}", e);
            let ddl = visitor_table_ddl(&self.client.visitor_table);
            if let Err(rpc_err) = self.create_table("visitor", ddl).await {
                warn!(
                    "Could not create visitor table, the service may not allow ad-hoc SQL: {}",
                    rpc_err
                );
            }
        }

        Ok(())
    }

    async fn read_count(&self) -> Result<u64> {
        match self.call(|c| c.fetch_count()).await? {
            Some(count) => to_count(count),
            None => Err(CounterError::not_initialized("counter row is missing")),
        }
    }

    async fn increment(&self) -> Result<u64> {
        for attempt in 0..=self.max_cas_retries {
            let current = match self.call(|c| c.fetch_count()).await? {
                Some(count) => count,
                None => return Err(CounterError::not_initialized("counter row is missing")),
            };
            let next = next_count(to_count(current)?)? as i64;
            if let Some(stored) = self.call(move |c| c.compare_and_swap(current, next)).await? {
                if attempt > 0 {
                    debug!("Increment succeeded after {} conflicts", attempt);
                }
                return to_count(stored);
            }

            if attempt < self.max_cas_retries {
                let delay = calculate_backoff(attempt + 1, CAS_BASE_DELAY_MS, CAS_MAX_DELAY_MS);
                debug!(
                    "Concurrent update detected at count {}, retrying in {} ms",
                    current, delay
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(CounterError::storage_unavailable(format!(
            "increment gave up after {} conflicting updates",
            self.max_cas_retries + 1
        )))
    }

    async fn append_visitor(&self, record: &VisitorRecord) -> Result<()> {
        let record = record.clone();
        self.call(move |c| c.insert_visitor(&record)).await
    }

    fn backend_name(&self) -> &'static str {
        "supabase"
    }
}
