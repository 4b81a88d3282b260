//! # Id Ledger
//!
//! The only durable state in the relay: a set of ids that have already been
//! handled. Two ledgers are used in practice, one for users who have
//! received the DM welcome message and one for spreadsheet rows that have
//! been printed.
//!
//! ## File Format
//!
//! A JSON array of integers, in insertion order:
//!
//! ```text
//! [284736192837, 99283746512, 12]
//! ```
//!
//! The file is read once when the ledger opens and rewritten atomically
//! (temp file + rename) on every insert. A missing or unparseable file
//! starts an empty ledger.
//!
//! The in-memory set never runs ahead of the file: an id whose write fails
//! is dropped again and the error returned, so the next attempt sees it as
//! new.
//!
//! ## Concurrency
//!
//! Check, side effect, insert and persist happen under one async mutex, so
//! two handlers racing on the same id cannot both greet the user.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, TegamiError};

/// Welcome text sent to a user the first time they DM the bot.
pub const WELCOME_MESSAGE: &str = "この度は、連携アプリとしてご利用いただきありがとうございます。\n\
私は自動応答ボットです。送信されたメッセージを処理し、プリンターに出力します。\n\
ご不明な点があれば、このDMでお気軽にお尋ねください。";

/// Sends the welcome DM. Implemented by the chat bot outside this crate.
#[async_trait]
pub trait GreetingSender: Send + Sync {
    async fn send_greeting(&self, user_id: u64, message: &str) -> Result<()>;
}

/// Append-only set of ids persisted as a JSON array.
#[derive(Debug)]
pub struct IdLedger {
    path: PathBuf,
    ids: Mutex<Vec<u64>>,
}

impl IdLedger {
    /// Open the ledger at `path`, loading any ids already recorded.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let ids = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Vec<u64>>(&bytes) {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ledger is empty or invalid JSON, starting fresh");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(TegamiError::Store(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        info!(path = %path.display(), count = ids.len(), "opened id ledger");
        Ok(Self {
            path,
            ids: Mutex::new(ids),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn contains(&self, id: u64) -> bool {
        self.ids.lock().await.contains(&id)
    }

    pub async fn len(&self) -> usize {
        self.ids.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.ids.lock().await.is_empty()
    }

    /// Record `id`. Returns `false` if it was already present.
    pub async fn insert(&self, id: u64) -> Result<bool> {
        let mut ids = self.ids.lock().await;
        if ids.contains(&id) {
            return Ok(false);
        }
        ids.push(id);
        if let Err(e) = persist(&self.path, &ids).await {
            ids.pop();
            return Err(e);
        }
        Ok(true)
    }

    /// Send the welcome message to `user_id` unless they already got it.
    ///
    /// The id is recorded only after the send succeeds and the ledger is
    /// written, so a user whose DMs are closed is retried on their next
    /// message. Returns whether a greeting was sent.
    pub async fn greet_if_new(&self, user_id: u64, sender: &dyn GreetingSender) -> Result<bool> {
        let mut ids = self.ids.lock().await;
        if ids.contains(&user_id) {
            debug!(user_id, "user already greeted");
            return Ok(false);
        }

        sender.send_greeting(user_id, WELCOME_MESSAGE).await?;

        ids.push(user_id);
        if let Err(e) = persist(&self.path, &ids).await {
            ids.pop();
            return Err(e);
        }
        info!(user_id, "greeted new user");
        Ok(true)
    }
}

async fn persist(path: &Path, ids: &[u64]) -> Result<()> {
    let json = serde_json::to_vec(ids)
        .map_err(|e| TegamiError::Store(format!("Failed to serialize ledger: {}", e)))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, &json)
        .await
        .map_err(|e| TegamiError::Store(format!("Failed to write {}: {}", tmp.display(), e)))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| TegamiError::Store(format!("Failed to replace {}: {}", path.display(), e)))?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSender {
        sent: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl GreetingSender for CountingSender {
        async fn send_greeting(&self, _user_id: u64, message: &str) -> Result<()> {
            assert_eq!(message, WELCOME_MESSAGE);
            if self.fail {
                return Err(TegamiError::Transport("DMs closed".into()));
            }
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = IdLedger::open(dir.path().join("ids.json")).await.unwrap();
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalid_json_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.json");
        std::fs::write(&path, b"").unwrap();
        let ledger = IdLedger::open(&path).await.unwrap();
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn test_insert_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.json");

        let ledger = IdLedger::open(&path).await.unwrap();
        assert!(ledger.insert(5).await.unwrap());
        assert!(ledger.insert(3).await.unwrap());
        assert!(!ledger.insert(5).await.unwrap());

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[5,3]");
        let reopened = IdLedger::open(&path).await.unwrap();
        assert!(reopened.contains(3).await);
        assert_eq!(reopened.len().await, 2);
    }

    #[tokio::test]
    async fn test_greet_once() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = IdLedger::open(dir.path().join("greeted.json")).await.unwrap();
        let sender = CountingSender::default();

        assert!(ledger.greet_if_new(42, &sender).await.unwrap());
        assert!(!ledger.greet_if_new(42, &sender).await.unwrap());
        assert_eq!(sender.sent.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_greeting_is_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = IdLedger::open(dir.path().join("greeted.json")).await.unwrap();
        let sender = CountingSender {
            fail: true,
            ..Default::default()
        };

        assert!(ledger.greet_if_new(42, &sender).await.is_err());
        assert!(!ledger.contains(42).await);
    }

    #[tokio::test]
    async fn test_failed_write_is_not_remembered() {
        let dir = tempfile::tempdir().unwrap();
        // Parent directory does not exist, so every write fails
        let ledger = IdLedger::open(dir.path().join("missing").join("ids.json")).await.unwrap();
        let sender = CountingSender::default();

        assert!(matches!(ledger.insert(5).await, Err(TegamiError::Store(_))));
        assert!(!ledger.contains(5).await);

        assert!(matches!(ledger.greet_if_new(42, &sender).await, Err(TegamiError::Store(_))));
        assert!(!ledger.contains(42).await);
        assert_eq!(sender.sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_greetings_send_once() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(IdLedger::open(dir.path().join("greeted.json")).await.unwrap());
        let sender = Arc::new(CountingSender::default());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = ledger.clone();
            let sender = sender.clone();
            handles.push(tokio::spawn(async move {
                ledger.greet_if_new(7, sender.as_ref()).await.unwrap()
            }));
        }
        let mut greeted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                greeted += 1;
            }
        }

        assert_eq!(greeted, 1);
        assert_eq!(sender.sent.load(Ordering::SeqCst), 1);
    }
}
