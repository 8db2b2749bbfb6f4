//! Directories of still images as a video stream.

use std::path::{Path, PathBuf};

use image::RgbImage;

use super::{check_geometry, Frame, FrameRead, FrameSink, FrameSource, VideoError, VideoResult};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Frame rate reported for image sequences unless overridden.
pub const DEFAULT_SEQUENCE_FPS: f64 = 30.0;

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Reads every image in a directory in lexicographic file-name order.
#[derive(Debug, Clone)]
pub struct ImageSequenceSource {
    files: Vec<PathBuf>,
    cursor: usize,
    fps: f64,
}

impl ImageSequenceSource {
    pub fn open(dir: impl AsRef<Path>) -> VideoResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(VideoError::FileNotFound(dir.to_path_buf()));
        }
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_image_file(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(VideoError::NoFrames(dir.to_path_buf()));
        }
        files.sort();
        tracing::debug!(dir = %dir.display(), n_files = files.len(), "opened image sequence");
        Ok(Self {
            files,
            cursor: 0,
            fps: DEFAULT_SEQUENCE_FPS,
        })
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = fps;
        self
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl FrameSource for ImageSequenceSource {
    fn rewind(&mut self) -> VideoResult<()> {
        self.cursor = 0;
        Ok(())
    }

    fn read_next(&mut self) -> VideoResult<FrameRead> {
        let index = self.cursor;
        let Some(path) = self.files.get(index) else {
            return Ok(FrameRead::End);
        };
        self.cursor += 1;
        Ok(match image::open(path) {
            Ok(img) => FrameRead::Frame(Frame::new(index, img.to_rgb8())),
            Err(err) => FrameRead::Unavailable {
                index,
                reason: format!("{}: {err}", path.display()),
            },
        })
    }

    fn frame_count_hint(&self) -> Option<usize> {
        Some(self.files.len())
    }

    fn fps(&self) -> Option<f64> {
        Some(self.fps)
    }
}

/// Writes `frame_000000.png`, `frame_000001.png`, … into a directory.
#[derive(Debug)]
pub struct ImageSequenceSink {
    dir: PathBuf,
    size: (u32, u32),
    written: usize,
    finished: bool,
}

impl ImageSequenceSink {
    /// Create (if needed) `dir` and accept frames of `width × height`.
    pub fn create(dir: impl AsRef<Path>, width: u32, height: u32) -> VideoResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            size: (width, height),
            written: 0,
            finished: false,
        })
    }

    pub fn frames_written(&self) -> usize {
        self.written
    }

    fn frame_path(&self, n: usize) -> PathBuf {
        self.dir.join(format!("frame_{n:06}.png"))
    }
}

impl FrameSink for ImageSequenceSink {
    fn write_frame(&mut self, image: &RgbImage) -> VideoResult<()> {
        if self.finished {
            return Err(VideoError::SinkFinished);
        }
        check_geometry(self.size, image)?;
        image.save(self.frame_path(self.written))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> VideoResult<()> {
        self.finished = true;
        Ok(())
    }
}
