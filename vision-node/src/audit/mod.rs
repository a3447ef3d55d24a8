use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use agv_vision_common::{DetectionRecord, SystemEvent};

use crate::error::StoreError;

pub mod postgres;

pub use postgres::PgEventStore;

/// The injected persistence collaborator. Implementations own their
/// connection lifecycle; a failed call must leave them ready to retry on
/// the next one.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert_detection(
        &self,
        record: &DetectionRecord,
        processing_time_ms: u64,
        image_path: Option<&str>,
    ) -> Result<i64, StoreError>;

    async fn insert_event(&self, event: &SystemEvent) -> Result<i64, StoreError>;

    /// Whether a real store is behind this collaborator; drives the
    /// `db_connected` health field.
    fn is_configured(&self) -> bool;
}

/// Null object used when no database is configured: every write is a
/// silent no-op and the node keeps serving detections.
pub struct NullEventStore;

#[async_trait]
impl EventStore for NullEventStore {
    async fn insert_detection(
        &self,
        _record: &DetectionRecord,
        _processing_time_ms: u64,
        _image_path: Option<&str>,
    ) -> Result<i64, StoreError> {
        Ok(0)
    }

    async fn insert_event(&self, _event: &SystemEvent) -> Result<i64, StoreError> {
        Ok(0)
    }

    fn is_configured(&self) -> bool {
        false
    }
}

enum AuditMessage {
    Detection {
        record: DetectionRecord,
        processing_time_ms: u64,
        image_path: Option<String>,
    },
    Event(SystemEvent),
}

/// Fire-and-forget adapter in front of the persistence collaborator.
///
/// Submissions are non-blocking channel sends; a detached writer task
/// performs the actual inserts and swallows every failure, so persistence
/// latency and errors are invisible to the paths that produce records.
#[derive(Clone)]
pub struct AuditSink {
    tx: mpsc::UnboundedSender<AuditMessage>,
}

impl AuditSink {
    /// Start the writer task for `store` and return the submission handle.
    /// Must be called from within a tokio runtime.
    pub fn spawn(store: Arc<dyn EventStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(store, rx));
        Self { tx }
    }

    pub fn detection(
        &self,
        record: DetectionRecord,
        processing_time_ms: u64,
        image_path: Option<&str>,
    ) {
        self.submit(AuditMessage::Detection {
            record,
            processing_time_ms,
            image_path: image_path.map(str::to_owned),
        });
    }

    pub fn event(&self, event: SystemEvent) {
        self.submit(AuditMessage::Event(event));
    }

    fn submit(&self, message: AuditMessage) {
        if self.tx.send(message).is_err() {
            debug!("audit writer is gone, dropping message");
        }
    }
}

async fn write_loop(store: Arc<dyn EventStore>, mut rx: mpsc::UnboundedReceiver<AuditMessage>) {
    while let Some(message) = rx.recv().await {
        match message {
            AuditMessage::Detection {
                record,
                processing_time_ms,
                image_path,
            } => {
                match store
                    .insert_detection(&record, processing_time_ms, image_path.as_deref())
                    .await
                {
                    Ok(id) => debug!(
                        id,
                        class = %record.object_class,
                        confidence = record.confidence,
                        "detection recorded"
                    ),
                    Err(e) => warn!(error = %e, "failed to record detection"),
                }
            }
            AuditMessage::Event(event) => match store.insert_event(&event).await {
                Ok(id) => debug!(id, level = %event.level, event_type = %event.event_type, "event recorded"),
                Err(e) => warn!(error = %e, "failed to record system event"),
            },
        }
    }
}
