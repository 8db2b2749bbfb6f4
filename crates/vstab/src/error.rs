//! Top-level error type of the stabilization pipeline.

use crate::motion::MotionError;
use crate::transform::TransformError;
use crate::video::VideoError;

pub type StabilizeResult<T> = Result<T, StabilizeError>;

#[derive(Debug, thiserror::Error)]
pub enum StabilizeError {
    #[error("motion estimation failed at frame {frame_index}: {source}")]
    Motion {
        frame_index: usize,
        #[source]
        source: MotionError,
    },

    #[error(transparent)]
    Video(#[from] VideoError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("config error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("input contains no decodable frames")]
    EmptyInput,
}

impl StabilizeError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
