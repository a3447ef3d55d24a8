use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use agv_vision_common::{DetectionRecord, SystemEvent};

use super::EventStore;
use crate::error::StoreError;

/// Audit store backed by PostgreSQL.
///
/// The pool is created lazily: a missing or unreachable database does not
/// prevent startup, and after a connection-level failure the next call
/// checks out (and if needed re-establishes) a fresh connection.
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn connect_lazy(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(url)?;
        Ok(Self { pool })
    }

    /// Best-effort schema setup; callers log and continue on failure.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("audit schema migrations applied");
        Ok(())
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn insert_detection(
        &self,
        record: &DetectionRecord,
        processing_time_ms: u64,
        image_path: Option<&str>,
    ) -> Result<i64, StoreError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO detections (
                timestamp, image_path, processing_time_ms,
                object_class, confidence,
                bbox_x1, bbox_y1, bbox_x2, bbox_y2,
                distance_meters, triggered_stop
            )
            VALUES (NOW(), $1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(image_path)
        .bind(processing_time_ms as i64)
        .bind(&record.object_class)
        .bind(record.confidence)
        .bind(record.bbox_normalized.x1)
        .bind(record.bbox_normalized.y1)
        .bind(record.bbox_normalized.x2)
        .bind(record.bbox_normalized.y2)
        .bind(record.distance_meters)
        .bind(record.triggered_stop)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn insert_event(&self, event: &SystemEvent) -> Result<i64, StoreError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO system_logs (
                timestamp, level, component, event_type, message, details,
                agv_speed_mms, battery_percentage, position_x, position_y,
                path_id, detection_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(event.created_at)
        .bind(event.level.as_str())
        .bind(&event.component)
        .bind(&event.event_type)
        .bind(&event.message)
        .bind(event.details.clone())
        .bind(event.agv_speed_mms)
        .bind(event.battery_percentage)
        .bind(event.position_x)
        .bind(event.position_y)
        .bind(event.path_id)
        .bind(event.detection_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    fn is_configured(&self) -> bool {
        true
    }
}
