//! JSON file counter store
//!
//! The counter file holds `{"id":1,"count":N}`. Reading is lenient: older
//! layouts (a bare integer, a quoted integer) are accepted, and anything
//! unreadable counts as zero so a damaged file never blocks the service.
//! Visitor records are appended as JSON lines to a separate file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{CounterRow, CounterStore, MAX_COUNT, VisitorRecord, next_count};
use crate::config::FileStorageConfig;
use crate::errors::{CounterError, Result};

pub struct FileStorage {
    path: PathBuf,
    visitor_log_path: PathBuf,
    /// 计数文件的读-改-写必须串行
    count_lock: Mutex<()>,
    log_lock: Mutex<()>,
}

/// Lenient counter parsing. `None` means the content is not a usable count,
/// including values above [`MAX_COUNT`].
pub fn parse_count(content: &str) -> Option<u64> {
    parse_any_count(content).filter(|n| *n <= MAX_COUNT)
}

fn parse_any_count(content: &str) -> Option<u64> {
    let trimmed = content.trim();
    if let Ok(n) = trimmed.parse::<u64>() {
        return Some(n);
    }

    fn from_value(value: &serde_json::Value) -> Option<u64> {
        match value {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        }
    }

    match serde_json::from_str::<serde_json::Value>(trimmed).ok()? {
        serde_json::Value::Object(map) => map.get("count").and_then(from_value),
        other => from_value(&other),
    }
}

impl FileStorage {
    pub fn new(config: &FileStorageConfig) -> Self {
        Self::with_paths(&config.path, &config.visitor_log_path)
    }

    pub fn with_paths(path: impl AsRef<Path>, visitor_log_path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            visitor_log_path: visitor_log_path.as_ref().to_path_buf(),
            count_lock: Mutex::new(()),
            log_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when the file does not exist
    async fn load(&self) -> Result<Option<u64>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => match parse_count(&content) {
                Some(n) => Ok(Some(n)),
                None => {
                    warn!(
                        "Counter file {} is malformed, treating count as 0",
                        self.path.display()
                    );
                    Ok(Some(0))
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CounterError::storage_unavailable(format!(
                "Failed to read counter file {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Write to `<file>.tmp`, fsync, then rename over the target
    async fn store(&self, count: u64) -> Result<()> {
        let json = serde_json::to_string(&CounterRow::new(count)?)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp_name = self.path.as_os_str().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let write = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(json.as_bytes()).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp_path, &self.path).await
        };

        write.await.map_err(|e| {
            CounterError::storage_unavailable(format!(
                "Failed to write counter file {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

#[async_trait]
impl CounterStore for FileStorage {
    async fn ensure_initialized(&self) -> Result<()> {
        let _guard = self.count_lock.lock().await;

        if self.load().await?.is_none() {
            self.store(0).await?;
            info!("Created counter file: {}", self.path.display());
        }
        Ok(())
    }

    async fn read_count(&self) -> Result<u64> {
        let _guard = self.count_lock.lock().await;
        Ok(self.load().await?.unwrap_or(0))
    }

    async fn increment(&self) -> Result<u64> {
        let _guard = self.count_lock.lock().await;

        let current = self.load().await?.unwrap_or(0);
        let next = next_count(current)?;
        self.store(next).await?;

        debug!("Counter file updated: {} -> {}", current, next);
        Ok(next)
    }

    async fn append_visitor(&self, record: &VisitorRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.log_lock.lock().await;

        if let Some(parent) = self.visitor_log_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.visitor_log_path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
