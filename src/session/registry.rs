//! Registry of live debugger sessions keyed by dump path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{DebuggerSession, DumpPath};
use crate::debugger::{BackendLauncher, SessionOptions};
use crate::{AppError, Result};

/// Shared map from dump path to session.
///
/// Get-or-create holds the map lock while inserting, so racing callers for
/// the same path always receive the same [`DebuggerSession`] and the engine
/// is launched exactly once.
pub struct SessionRegistry {
    launcher: Arc<dyn BackendLauncher>,
    sessions: Mutex<HashMap<DumpPath, Arc<DebuggerSession>>>,
}

impl SessionRegistry {
    /// Create an empty registry that launches engines through `launcher`.
    #[must_use]
    pub fn new(launcher: Arc<dyn BackendLauncher>) -> Self {
        Self {
            launcher,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Return the session for `path`, creating and starting it if needed.
    ///
    /// `options` only apply when a new session is created; an existing
    /// session keeps the options it was created with.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SessionCreationFailed` if the engine cannot be
    /// started. No entry is retained for the path in that case.
    pub async fn get_or_create(
        &self,
        path: &DumpPath,
        options: &SessionOptions,
    ) -> Result<Arc<DebuggerSession>> {
        loop {
            let session = {
                let mut sessions = self.sessions.lock().await;
                if let Some(existing) = sessions.get(path) {
                    Arc::clone(existing)
                } else {
                    let session = Arc::new(DebuggerSession::new(
                        path.clone(),
                        options.clone(),
                        Arc::clone(&self.launcher),
                    ));
                    sessions.insert(path.clone(), Arc::clone(&session));
                    info!(dump = %path, "session registered");
                    session
                }
            };

            match session.ensure_started().await {
                Ok(()) => return Ok(session),
                // Closed between lookup and start: a removal or a failed
                // launch by another caller. Retry against a fresh entry.
                Err(AppError::SessionClosed(_)) => {
                    self.discard(path, &session).await;
                }
                Err(err) => {
                    self.discard(path, &session).await;
                    warn!(dump = %path, %err, "session creation failed");
                    return Err(err);
                }
            }
        }
    }

    /// Close the session for `path` and evict it. Returns whether a session
    /// existed.
    pub async fn remove(&self, path: &DumpPath) -> bool {
        let removed = self.sessions.lock().await.remove(path);
        match removed {
            Some(session) => {
                if let Err(err) = session.close().await {
                    warn!(dump = %path, %err, "error while closing session");
                }
                info!(dump = %path, "session removed");
                true
            }
            None => false,
        }
    }

    /// Paths with a registered session, sorted.
    pub async fn list(&self) -> Vec<DumpPath> {
        let mut paths: Vec<DumpPath> = self.sessions.lock().await.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Whether no sessions are registered.
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Close and evict every session idle for at least `max_idle` that is
    /// not currently executing. Returns the evicted paths.
    pub async fn evict_idle(&self, max_idle: Duration) -> Vec<DumpPath> {
        let evicted: Vec<(DumpPath, Arc<DebuggerSession>)> = {
            let mut sessions = self.sessions.lock().await;
            let stale: Vec<DumpPath> = sessions
                .iter()
                .filter(|(_, session)| !session.is_busy() && session.idle_for() >= max_idle)
                .map(|(path, _)| path.clone())
                .collect();
            stale
                .into_iter()
                .filter_map(|path| sessions.remove(&path).map(|session| (path, session)))
                .collect()
        };

        // Release the map lock before closing engines.
        for (path, session) in &evicted {
            if let Err(err) = session.close().await {
                warn!(dump = %path, %err, "error while closing idle session");
            }
            info!(dump = %path, "idle session evicted");
        }

        evicted.into_iter().map(|(path, _)| path).collect()
    }

    /// Close every session. Used on server shutdown.
    pub async fn close_all(&self) {
        let drained: Vec<(DumpPath, Arc<DebuggerSession>)> =
            self.sessions.lock().await.drain().collect();
        for (path, session) in drained {
            if let Err(err) = session.close().await {
                warn!(dump = %path, %err, "error while closing session at shutdown");
            }
        }
    }

    /// Drop `path`'s entry if it still refers to `session`.
    pub async fn discard(&self, path: &DumpPath, session: &Arc<DebuggerSession>) {
        let mut sessions = self.sessions.lock().await;
        if sessions
            .get(path)
            .is_some_and(|current| Arc::ptr_eq(current, session))
        {
            sessions.remove(path);
        }
    }
}
