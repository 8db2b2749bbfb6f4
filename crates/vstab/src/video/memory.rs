use image::RgbImage;

use super::{check_geometry, Frame, FrameRead, FrameSink, FrameSource, VideoError, VideoResult};

/// Frames held in memory; `None` entries read as undecodable.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    frames: Vec<Option<RgbImage>>,
    cursor: usize,
    fps: Option<f64>,
}

impl MemorySource {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self::with_gaps(frames.into_iter().map(Some).collect())
    }

    pub fn with_gaps(frames: Vec<Option<RgbImage>>) -> Self {
        Self {
            frames,
            cursor: 0,
            fps: None,
        }
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = Some(fps);
        self
    }
}

impl FrameSource for MemorySource {
    fn rewind(&mut self) -> VideoResult<()> {
        self.cursor = 0;
        Ok(())
    }

    fn read_next(&mut self) -> VideoResult<FrameRead> {
        let index = self.cursor;
        let Some(slot) = self.frames.get(index) else {
            return Ok(FrameRead::End);
        };
        self.cursor += 1;
        Ok(match slot {
            Some(image) => FrameRead::Frame(Frame::new(index, image.clone())),
            None => FrameRead::Unavailable {
                index,
                reason: "frame missing".to_string(),
            },
        })
    }

    fn frame_count_hint(&self) -> Option<usize> {
        Some(self.frames.len())
    }

    fn fps(&self) -> Option<f64> {
        self.fps
    }
}

/// Collects written frames in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub frames: Vec<RgbImage>,
    size: Option<(u32, u32)>,
    finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that rejects frames of any other size.
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            size: Some((width, height)),
            ..Self::default()
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn into_frames(self) -> Vec<RgbImage> {
        self.frames
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, image: &RgbImage) -> VideoResult<()> {
        if self.finished {
            return Err(VideoError::SinkFinished);
        }
        if let Some(size) = self.size {
            check_geometry(size, image)?;
        }
        self.frames.push(image.clone());
        Ok(())
    }

    fn finish(&mut self) -> VideoResult<()> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_reports_gaps_and_rewinds() {
        let img = RgbImage::new(4, 3);
        let mut src = MemorySource::with_gaps(vec![Some(img.clone()), None, Some(img)]);
        assert!(matches!(src.read_next().unwrap(), FrameRead::Frame(f) if f.index == 0));
        assert!(matches!(
            src.read_next().unwrap(),
            FrameRead::Unavailable { index: 1, .. }
        ));
        assert!(matches!(src.read_next().unwrap(), FrameRead::Frame(f) if f.index == 2));
        assert!(matches!(src.read_next().unwrap(), FrameRead::End));
        src.rewind().unwrap();
        assert!(matches!(src.read_next().unwrap(), FrameRead::Frame(f) if f.index == 0));
    }

    #[test]
    fn sink_checks_size_and_finish() {
        let mut sink = MemorySink::with_size(4, 3);
        sink.write_frame(&RgbImage::new(4, 3)).unwrap();
        assert!(matches!(
            sink.write_frame(&RgbImage::new(5, 3)),
            Err(VideoError::GeometryMismatch { .. })
        ));
        sink.finish().unwrap();
        assert!(matches!(
            sink.write_frame(&RgbImage::new(4, 3)),
            Err(VideoError::SinkFinished)
        ));
        assert_eq!(sink.into_frames().len(), 1);
    }
}
