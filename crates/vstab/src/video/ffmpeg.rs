//! Video containers through the `ffprobe` / `ffmpeg` command-line tools.
//!
//! Decoding and encoding stream raw `rgb24` frames over pipes, so any codec
//! the local ffmpeg build supports works without native bindings.

use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::{check_geometry, Frame, FrameGeometry, FrameRead, FrameSink, FrameSource, VideoError, VideoResult};

// ── Probe ──────────────────────────────────────────────────────────────────

/// Video stream information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Frame count, when the container records it
    pub frame_count: Option<usize>,
    /// Duration in seconds
    pub duration: f64,
    /// Video codec
    pub codec: String,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

fn locate(tool: &'static str) -> VideoResult<PathBuf> {
    which::which(tool).map_err(|_| VideoError::ToolNotFound { tool })
}

/// Probe the first video stream of `path`.
pub fn probe_video(path: impl AsRef<Path>) -> VideoResult<VideoInfo> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(VideoError::FileNotFound(path.to_path_buf()));
    }
    let ffprobe = locate("ffprobe")?;

    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    if !output.status.success() {
        return Err(VideoError::ToolFailed {
            tool: "ffprobe",
            message: format!("exit status {}", output.status),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
    video_info_from_probe(&probe)
}

fn video_info_from_probe(probe: &FfprobeOutput) -> VideoResult<VideoInfo> {
    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| VideoError::InvalidVideo("no video stream found".to_string()))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(VideoError::InvalidVideo(
                "video stream has no frame size".to_string(),
            ))
        }
    };

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(30.0);

    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(VideoInfo {
        width,
        height,
        fps,
        frame_count: stream.nb_frames.as_deref().and_then(|n| n.parse().ok()),
        duration,
        codec: stream.codec_name.clone().unwrap_or_default(),
    })
}

/// Parse `"30000/1001"` or `"25"`; zero or malformed rates yield `None`.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

// ── Decoder ────────────────────────────────────────────────────────────────

/// Decodes a video file by piping raw frames out of `ffmpeg`.
///
/// The child process is killed and reaped when the source is rewound or
/// dropped.
#[derive(Debug)]
pub struct FfmpegSource {
    path: PathBuf,
    ffmpeg: PathBuf,
    info: VideoInfo,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    next_index: usize,
}

impl FfmpegSource {
    pub fn open(path: impl AsRef<Path>) -> VideoResult<Self> {
        let path = path.as_ref().to_path_buf();
        let info = probe_video(&path)?;
        let ffmpeg = locate("ffmpeg")?;
        tracing::info!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = info.fps,
            codec = %info.codec,
            "opened video"
        );
        let mut source = Self {
            path,
            ffmpeg,
            info,
            child: None,
            stdout: None,
            next_index: 0,
        };
        source.spawn()?;
        Ok(source)
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn frame_len(&self) -> usize {
        self.info.width as usize * self.info.height as usize * 3
    }

    fn spawn(&mut self) -> VideoResult<()> {
        self.stop();
        let mut child = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(&self.path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        self.stdout = child.stdout.take();
        self.child = Some(child);
        self.next_index = 0;
        Ok(())
    }

    fn stop(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl FrameSource for FfmpegSource {
    fn rewind(&mut self) -> VideoResult<()> {
        self.spawn()
    }

    fn read_next(&mut self) -> VideoResult<FrameRead> {
        let frame_len = self.frame_len();
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(FrameRead::End);
        };

        let mut buf = vec![0u8; frame_len];
        let mut filled = 0;
        while filled < frame_len {
            match stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if filled < frame_len {
            if filled > 0 {
                tracing::warn!(
                    index = self.next_index,
                    bytes = filled,
                    expected = frame_len,
                    "truncated trailing frame dropped"
                );
            }
            self.stop();
            return Ok(FrameRead::End);
        }

        let index = self.next_index;
        self.next_index += 1;
        match RgbImage::from_raw(self.info.width, self.info.height, buf) {
            Some(image) => Ok(FrameRead::Frame(Frame::new(index, image))),
            None => Ok(FrameRead::Unavailable {
                index,
                reason: "raw frame has the wrong size".to_string(),
            }),
        }
    }

    fn frame_count_hint(&self) -> Option<usize> {
        self.info.frame_count
    }

    fn fps(&self) -> Option<f64> {
        Some(self.info.fps)
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Encoder ────────────────────────────────────────────────────────────────

/// Default encoder for [`FfmpegSink`].
pub const DEFAULT_CODEC: &str = "libx264";

/// Output pixel format: 4:2:0 chroma needs even sides, so odd-sized
/// frames are encoded as 4:4:4.
fn output_pixel_format(geometry: &FrameGeometry) -> &'static str {
    if geometry.width % 2 == 0 && geometry.height % 2 == 0 {
        "yuv420p"
    } else {
        "yuv444p"
    }
}

/// Encodes frames by piping raw `rgb24` data into `ffmpeg`.
///
/// Dropping an unfinished sink closes the pipe and waits for the encoder so
/// the frames written so far are flushed.
#[derive(Debug)]
pub struct FfmpegSink {
    path: PathBuf,
    geometry: FrameGeometry,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    /// Collects encoder diagnostics so a full pipe never stalls ffmpeg.
    stderr: Option<JoinHandle<String>>,
    written: usize,
}

impl FfmpegSink {
    pub fn create(path: impl AsRef<Path>, geometry: FrameGeometry) -> VideoResult<Self> {
        Self::with_codec(path, geometry, DEFAULT_CODEC)
    }

    pub fn with_codec(path: impl AsRef<Path>, geometry: FrameGeometry, codec: &str) -> VideoResult<Self> {
        let path = path.as_ref().to_path_buf();
        let ffmpeg = locate("ffmpeg")?;
        let size = format!("{}x{}", geometry.width, geometry.height);
        let fps = format!("{}", geometry.fps);
        let pix_fmt = output_pixel_format(&geometry);

        let mut child = Command::new(ffmpeg)
            .args(["-y", "-v", "error", "-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-s", &size, "-r", &fps, "-i", "-"])
            .args(["-c:v", codec, "-pix_fmt", pix_fmt])
            .arg(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        let stdin = child.stdin.take();
        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut bytes = Vec::new();
                let _ = pipe.read_to_end(&mut bytes);
                String::from_utf8_lossy(&bytes).into_owned()
            })
        });
        tracing::debug!(path = %path.display(), %size, %fps, codec, pix_fmt, "started encoder");

        Ok(Self {
            path,
            geometry,
            child: Some(child),
            stdin,
            stderr,
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames_written(&self) -> usize {
        self.written
    }

    fn close(&mut self) -> VideoResult<()> {
        // Closing stdin signals end of stream.
        self.stdin = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait()?;
        let stderr = self.stderr.take().and_then(|reader| reader.join().ok());
        if !status.success() {
            return Err(VideoError::ToolFailed {
                tool: "ffmpeg",
                message: format!("encoder exited with {status}"),
                stderr,
            });
        }
        Ok(())
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, image: &RgbImage) -> VideoResult<()> {
        check_geometry(self.geometry.size(), image)?;
        let stdin = self.stdin.as_mut().ok_or(VideoError::SinkFinished)?;
        if let Err(e) = stdin.write_all(image.as_raw()) {
            // A broken pipe means the encoder died; its exit status and
            // stderr say why.
            if e.kind() == ErrorKind::BrokenPipe {
                self.close()?;
            }
            return Err(e.into());
        }
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> VideoResult<()> {
        if self.child.is_none() {
            return Err(VideoError::SinkFinished);
        }
        self.close()?;
        tracing::info!(path = %self.path.display(), frames = self.written, "encoder finished");
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if self.child.is_some() {
            if let Err(e) = self.close() {
                tracing::warn!(path = %self.path.display(), error = %e, "encoder did not exit cleanly");
            }
        }
    }
}
