#[cfg(test)]
mod tests;

use std::{
    collections::HashSet,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};

/// I/O failure on the ledger file.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The file exists but could not be read.
    #[error("Failed to read ledger {path}: {source}")]
    Read {
        /// Ledger file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The file could not be created or appended to.
    #[error("Failed to write ledger {path}: {source}")]
    Write {
        /// Ledger file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// Result of a ledger operation.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// The persisted set of offer ids that were already delivered.
#[automock]
#[async_trait]
pub trait SentLedger: Send + Sync {
    /// Loads every recorded id. An absent ledger is an empty set.
    async fn load(&self) -> LedgerResult<HashSet<String>>;

    /// Records newly delivered ids. Ids already present may be recorded
    /// again.
    async fn record(&self, ids: &[String]) -> LedgerResult<()>;
}

/// Append-only ledger file with one id per line.
///
/// All reads and writes of the file go through this instance and are
/// serialized by its lock.
pub struct FileLedger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileLedger {
    /// Creates a ledger backed by `path`. The file is created on the first
    /// record.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    /// Location of the ledger file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_error(&self, source: std::io::Error) -> LedgerError {
        LedgerError::Read { path: self.path.clone(), source }
    }

    fn write_error(&self, source: std::io::Error) -> LedgerError {
        LedgerError::Write { path: self.path.clone(), source }
    }
}

#[async_trait]
impl SentLedger for FileLedger {
    async fn load(&self) -> LedgerResult<HashSet<String>> {
        let _guard = self.lock.lock().await;

        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Ledger {} does not exist yet", self.path.display());
                return Ok(HashSet::new());
            }
            Err(e) => return Err(self.read_error(e)),
        };

        let ids: HashSet<String> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        tracing::debug!("Loaded {} sent ids from {}", ids.len(), self.path.display());

        Ok(ids)
    }

    async fn record(&self, ids: &[String]) -> LedgerResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let _guard = self.lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| self.write_error(e))?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.write_error(e))?;

        let lines: String = ids.iter().map(|id| format!("{}\n", id.trim())).collect();
        file.write_all(lines.as_bytes()).await.map_err(|e| self.write_error(e))?;
        file.flush().await.map_err(|e| self.write_error(e))?;

        tracing::debug!("Recorded {} ids in {}", ids.len(), self.path.display());
        Ok(())
    }
}
