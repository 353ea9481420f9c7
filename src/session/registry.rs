//! One live session per request key.
//!
//! Starting a session for a key that already has one cancels the previous
//! session and waits for its task to exit before the new one opens, so two
//! sessions for the same key never deliver events concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{SessionOutcome, StreamSession};

struct Entry {
    id: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct RegistryInner {
    sessions: Mutex<HashMap<String, Entry>>,
    /// Serializes `start` so replacement of one key is atomic
    start_gate: tokio::sync::Mutex<()>,
}

/// Tracks running sessions by key.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

/// Caller-side handle for a session started through the registry.
#[derive(Debug)]
pub struct SessionHandle {
    id: String,
    key: String,
    cancel: CancellationToken,
    outcome: oneshot::Receiver<SessionOutcome>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the session to end.
    ///
    /// Returns None if the session task panicked or was aborted.
    pub async fn wait(self) -> Option<SessionOutcome> {
        self.outcome.await.ok()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: Mutex::new(HashMap::new()),
                start_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Spawn `session` under `key`, replacing any session already running
    /// for it.
    pub async fn start(&self, key: impl Into<String>, session: StreamSession) -> SessionHandle {
        let key = key.into();
        let _gate = self.inner.start_gate.lock().await;

        let previous = self.lock_sessions().remove(&key);
        if let Some(previous) = previous {
            tracing::info!(key = %key, previous = %previous.id, "Replacing active session");
            previous.cancel.cancel();
            if let Err(e) = previous.task.await {
                tracing::warn!(key = %key, "Previous session task failed: {}", e);
            }
        }

        let session = session.with_key(key.clone());
        let id = session.id().to_string();
        let cancel = session.cancel_token();
        let (tx, rx) = oneshot::channel();

        let mut sessions = self.lock_sessions();
        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let task_id = id.clone();
        let task = tokio::spawn(async move {
            let outcome = session.run().await;
            {
                let mut sessions = inner
                    .sessions
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if sessions.get(&task_key).map(|e| e.id == task_id) == Some(true) {
                    sessions.remove(&task_key);
                }
            }
            let _ = tx.send(outcome);
        });
        sessions.insert(
            key.clone(),
            Entry {
                id: id.clone(),
                cancel: cancel.clone(),
                task,
            },
        );

        SessionHandle {
            id,
            key,
            cancel,
            outcome: rx,
        }
    }

    /// Cancel the session running under `key` and wait for it to exit.
    ///
    /// Returns false if no session was active for the key.
    pub async fn cancel(&self, key: &str) -> bool {
        let _gate = self.inner.start_gate.lock().await;
        let entry = self.lock_sessions().remove(key);
        match entry {
            Some(entry) => {
                entry.cancel.cancel();
                if let Err(e) = entry.task.await {
                    tracing::warn!(key = %key, "Session task failed: {}", e);
                }
                true
            }
            None => false,
        }
    }

    /// Cancel every active session without waiting.
    pub fn cancel_all(&self) {
        for entry in self.lock_sessions().values() {
            entry.cancel.cancel();
        }
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.lock_sessions().contains_key(key)
    }

    pub fn active_count(&self) -> usize {
        self.lock_sessions().len()
    }

    fn lock_sessions(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.inner
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("active", &self.active_count())
            .finish()
    }
}
