//! Frame sources and sinks.
//!
//! A [`FrameSource`] yields decoded frames in order and can be rewound for a
//! second pass. A [`FrameSink`] is append-only. Implementations cover
//! directories of still images, any container the `ffmpeg` CLI can read or
//! write, and in-memory buffers.

mod ffmpeg;
mod image_sequence;
mod memory;

pub use ffmpeg::{probe_video, FfmpegSink, FfmpegSource, VideoInfo, DEFAULT_CODEC};
pub use image_sequence::{ImageSequenceSink, ImageSequenceSource, DEFAULT_SEQUENCE_FPS};
pub use memory::{MemorySink, MemorySource};

use std::path::PathBuf;

use image::RgbImage;

// ── Errors ─────────────────────────────────────────────────────────────────

pub type VideoResult<T> = Result<T, VideoError>;

#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    #[error("{tool} not found in PATH")]
    ToolNotFound { tool: &'static str },

    #[error("{tool} failed: {message}")]
    ToolFailed {
        tool: &'static str,
        message: String,
        stderr: Option<String>,
    },

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("no frames found in {0}")]
    NoFrames(PathBuf),

    #[error("invalid video: {0}")]
    InvalidVideo(String),

    #[error("frame is {got_width}x{got_height}, sink expects {width}x{height}")]
    GeometryMismatch {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },

    #[error("sink already finished")]
    SinkFinished,

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

// ── Frames ─────────────────────────────────────────────────────────────────

/// A decoded frame and its ordinal in the source.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: usize,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: usize, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Luma view for motion estimation.
    pub fn to_gray(&self) -> image::GrayImage {
        image::imageops::grayscale(&self.image)
    }
}

/// Outcome of one [`FrameSource::read_next`] call.
#[derive(Debug)]
pub enum FrameRead {
    Frame(Frame),
    /// The frame at `index` exists but could not be decoded.
    Unavailable { index: usize, reason: String },
    End,
}

/// Output stream geometry, fixed by the first decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl FrameGeometry {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

// ── Capabilities ───────────────────────────────────────────────────────────

/// Sequential, rewindable frame decoder.
pub trait FrameSource {
    /// Restart from the first frame.
    fn rewind(&mut self) -> VideoResult<()>;

    /// Next frame in order. Per-frame decode failures are reported as
    /// [`FrameRead::Unavailable`]; `Err` is reserved for failures of the
    /// source itself.
    fn read_next(&mut self) -> VideoResult<FrameRead>;

    /// Number of frames, when known up front.
    fn frame_count_hint(&self) -> Option<usize> {
        None
    }

    /// Native frame rate, when known.
    fn fps(&self) -> Option<f64> {
        None
    }
}

/// Append-only frame encoder.
pub trait FrameSink {
    fn write_frame(&mut self, image: &RgbImage) -> VideoResult<()>;

    /// Flush and close. Writing after `finish` is an error.
    fn finish(&mut self) -> VideoResult<()>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn rewind(&mut self) -> VideoResult<()> {
        (**self).rewind()
    }

    fn read_next(&mut self) -> VideoResult<FrameRead> {
        (**self).read_next()
    }

    fn frame_count_hint(&self) -> Option<usize> {
        (**self).frame_count_hint()
    }

    fn fps(&self) -> Option<f64> {
        (**self).fps()
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn write_frame(&mut self, image: &RgbImage) -> VideoResult<()> {
        (**self).write_frame(image)
    }

    fn finish(&mut self) -> VideoResult<()> {
        (**self).finish()
    }
}

fn check_geometry(expected: (u32, u32), image: &RgbImage) -> VideoResult<()> {
    let (got_width, got_height) = image.dimensions();
    if (got_width, got_height) != expected {
        return Err(VideoError::GeometryMismatch {
            width: expected.0,
            height: expected.1,
            got_width,
            got_height,
        });
    }
    Ok(())
}
