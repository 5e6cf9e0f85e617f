use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{db::AnalyticsStore, models::InteractionEvent};

/// Fire-and-forget writer for incremental interaction events
///
/// `submit` only enqueues; a background task writes each batch to the
/// store. Failed writes are logged and dropped, never reported to the caller.
#[derive(Clone)]
pub struct InteractionSink {
    write_tx: mpsc::UnboundedSender<Vec<InteractionEvent>>,
}

/// Handle for gracefully shutting down the interaction writer
pub struct InteractionSinkHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl InteractionSinkHandle {
    /// Signals the writer task and waits until queued events are flushed
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Interaction writer task panicked");
        }
    }
}

impl InteractionSink {
    pub fn new(store: Arc<dyn AnalyticsStore>) -> (Self, InteractionSinkHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let task = tokio::spawn(async move {
            Self::writer_task(store, write_rx, shutdown_rx).await;
        });

        (Self { write_tx }, InteractionSinkHandle { shutdown_tx, task })
    }

    async fn writer_task(
        store: Arc<dyn AnalyticsStore>,
        mut write_rx: mpsc::UnboundedReceiver<Vec<InteractionEvent>>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!(store = store.name(), "Interaction writer task started");

        loop {
            tokio::select! {
                Some(events) = write_rx.recv() => {
                    Self::write(store.as_ref(), events).await;
                }
                _ = shutdown_rx.recv() => {
                    let mut flushed = 0usize;
                    while let Ok(events) = write_rx.try_recv() {
                        Self::write(store.as_ref(), events).await;
                        flushed += 1;
                    }

                    tracing::info!(flushed, "Interaction writer task stopped");
                    break;
                }
            }
        }
    }

    async fn write(store: &dyn AnalyticsStore, events: Vec<InteractionEvent>) {
        if let Err(e) = store.record_interactions(&events).await {
            tracing::error!(
                error = %e,
                dropped = events.len(),
                store = store.name(),
                "Failed to persist interactions"
            );
        }
    }

    /// Queues events for persistence without waiting
    pub fn submit(&self, events: Vec<InteractionEvent>) {
        if events.is_empty() {
            return;
        }
        if let Err(e) = self.write_tx.send(events) {
            tracing::error!(error = %e, "Interaction writer is gone, dropping events");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{FileStore, MockAnalyticsStore};
    use crate::error::AppError;
    use crate::models::InteractionType;
    use chrono::Utc;

    fn event(video: &str) -> InteractionEvent {
        InteractionEvent {
            user_id: "u1".to_string(),
            video_id: video.to_string(),
            interaction_type: InteractionType::View,
            is_recommended: false,
            session_id: "s1".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_shutdown_flushes_queued_events() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::open(dir.path()).await.unwrap());

        let (sink, handle) = InteractionSink::new(store.clone());
        sink.submit(vec![event("a")]);
        sink.submit(vec![event("b"), event("c")]);
        handle.shutdown().await;

        assert_eq!(store.counts().await.unwrap().video_interactions, 3);
    }

    #[tokio::test]
    async fn test_failed_write_is_swallowed() {
        let mut store = MockAnalyticsStore::new();
        store
            .expect_record_interactions()
            .times(1)
            .returning(|_| Err(AppError::Persistence("disk full".to_string())));
        store.expect_name().return_const("mock");

        let (sink, handle) = InteractionSink::new(Arc::new(store));
        sink.submit(vec![event("a")]);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_empty_submit_is_ignored() {
        let mut store = MockAnalyticsStore::new();
        store.expect_record_interactions().times(0);
        store.expect_name().return_const("mock");

        let (sink, handle) = InteractionSink::new(Arc::new(store));
        sink.submit(vec![]);
        handle.shutdown().await;
    }
}
