use thiserror::Error;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("failed to open camera {device}: {reason}")]
    Open { device: String, reason: String },

    #[error("frame read failed: {0}")]
    Read(String),

    #[error("frame encode failed: {0}")]
    Encode(#[from] image::ImageError),
}

#[derive(Error, Debug)]
#[error("model inference failed: {0}")]
pub struct InferenceError(pub String);

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("confidence threshold {0} is outside [0.0, 1.0]")]
    InvalidThreshold(f32),

    #[error("cannot decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("no frame has been captured yet")]
    NoFrame,

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}
