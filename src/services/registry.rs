use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::{
    error::{AppError, AppResult},
    models::SessionId,
    services::analytics::SessionContext,
};

/// Upper bound between two idle sweeps
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct SessionSlot {
    ctx: Arc<Mutex<SessionContext>>,
    last_touched: Instant,
}

impl SessionSlot {
    fn new(ctx: Arc<Mutex<SessionContext>>) -> Self {
        Self {
            ctx,
            last_touched: Instant::now(),
        }
    }
}

/// Live aggregator sessions, keyed by session id
///
/// Each context sits behind its own mutex, and the map lock is never held
/// while waiting on one, so a slow summary write only blocks its own session.
/// Sessions leave the map when ended explicitly or after sitting idle.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<String, SessionSlot>>>,
}

fn not_found(session_id: &str) -> AppError {
    AppError::NotFound(format!("Session {} not found", session_id))
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh context and returns its id
    pub async fn start(&self) -> SessionId {
        let ctx = SessionContext::new();
        let session_id = ctx.session_id().clone();

        self.inner.write().await.insert(
            session_id.0.clone(),
            SessionSlot::new(Arc::new(Mutex::new(ctx))),
        );

        tracing::info!(session_id = %session_id, "Session started");
        session_id
    }

    /// Looks a session up and marks it as active
    pub async fn get(&self, session_id: &str) -> AppResult<Arc<Mutex<SessionContext>>> {
        let mut sessions = self.inner.write().await;
        let slot = sessions
            .get_mut(session_id)
            .ok_or_else(|| not_found(session_id))?;

        slot.last_touched = Instant::now();
        Ok(slot.ctx.clone())
    }

    /// Resets a context and moves it under its new id. The old id stops resolving.
    pub async fn reset(&self, session_id: &str) -> AppResult<SessionId> {
        let ctx = self
            .inner
            .write()
            .await
            .remove(session_id)
            .ok_or_else(|| not_found(session_id))?
            .ctx;

        // Waits for any in-flight summary on this session only
        let new_id = {
            let mut guard = ctx.lock().await;
            guard.reset();
            guard.session_id().clone()
        };

        self.inner
            .write()
            .await
            .insert(new_id.0.clone(), SessionSlot::new(ctx));
        Ok(new_id)
    }

    /// Drops a finished session
    pub async fn end(&self, session_id: &str) -> AppResult<()> {
        self.inner
            .write()
            .await
            .remove(session_id)
            .ok_or_else(|| not_found(session_id))?;

        tracing::info!(session_id = %session_id, "Session ended");
        Ok(())
    }

    /// Removes sessions untouched for longer than `idle_ttl` as of `now`.
    /// Sessions whose context is currently locked are kept.
    pub async fn evict_idle(&self, idle_ttl: Duration, now: Instant) -> usize {
        let mut sessions = self.inner.write().await;
        let before = sessions.len();

        sessions.retain(|_, slot| {
            now.duration_since(slot.last_touched) <= idle_ttl || slot.ctx.try_lock().is_err()
        });

        before - sessions.len()
    }

    /// Periodically evicts idle sessions until the returned task is aborted
    pub fn spawn_sweeper(&self, idle_ttl: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        let every = idle_ttl.min(MAX_SWEEP_INTERVAL);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let evicted = registry.evict_idle(idle_ttl, Instant::now()).await;
                if evicted > 0 {
                    let remaining = registry.len().await;
                    tracing::info!(
                        evicted,
                        remaining,
                        "Evicted idle sessions"
                    );
                }
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
