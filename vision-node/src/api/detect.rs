use actix_multipart::Multipart;
use actix_web::{error, get, post, web, HttpResponse};
use futures::StreamExt;
use serde::Deserialize;
use validator::Validate;

use crate::detection::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::error::DetectError;
use crate::AppState;

fn default_threshold() -> f32 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

#[derive(Debug, Deserialize, Validate)]
pub struct ThresholdQuery {
    #[serde(default = "default_threshold")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub threshold: f32,
}

/// Detect objects in an uploaded image (multipart `file` field).
#[post("/detect")]
pub(crate) async fn detect_upload(
    state: web::Data<AppState>,
    query: web::Query<ThresholdQuery>,
    payload: Multipart,
) -> Result<HttpResponse, actix_web::Error> {
    query.validate().map_err(error::ErrorBadRequest)?;
    let threshold = query.threshold;

    let (image_bytes, filename) = read_image_field(payload).await?;

    let service = state.detection.clone();
    let result = web::block(move || service.detect_from_bytes(&image_bytes, threshold, filename.as_deref()))
        .await
        .map_err(error::ErrorInternalServerError)?
        .map_err(|e| match e {
            DetectError::Decode(_) | DetectError::InvalidThreshold(_) => error::ErrorBadRequest(e),
            _ => error::ErrorInternalServerError(e),
        })?;

    Ok(HttpResponse::Ok().json(result))
}

/// Detect objects in the camera's most recently captured frame.
#[get("/detect/latest")]
pub(crate) async fn detect_latest(
    state: web::Data<AppState>,
    query: web::Query<ThresholdQuery>,
) -> Result<HttpResponse, actix_web::Error> {
    query.validate().map_err(error::ErrorBadRequest)?;
    let threshold = query.threshold;

    let service = state.detection.clone();
    let result = web::block(move || service.detect_from_store(threshold))
        .await
        .map_err(error::ErrorInternalServerError)?
        .map_err(|e| match e {
            DetectError::NoFrame => error::ErrorNotFound(e),
            DetectError::InvalidThreshold(_) => error::ErrorBadRequest(e),
            // A stored frame that fails to decode is a server-side problem.
            _ => error::ErrorInternalServerError(e),
        })?;

    Ok(HttpResponse::Ok().json(result))
}

/// Pull the bytes and filename of the `file` field out of a multipart body.
async fn read_image_field(
    mut payload: Multipart,
) -> Result<(Vec<u8>, Option<String>), actix_web::Error> {
    while let Some(item) = payload.next().await {
        let mut field = item.map_err(error::ErrorBadRequest)?;
        if field.name() != "file" {
            continue;
        }

        let filename = field
            .content_disposition()
            .get_filename()
            .map(str::to_owned);
        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            bytes.extend_from_slice(&chunk.map_err(error::ErrorBadRequest)?);
        }
        return Ok((bytes, filename));
    }

    Err(error::ErrorBadRequest("multipart field `file` is required"))
}
