//! Shared helpers for the integration tests.
//!
//! Most tests run against [`SyntheticVideo`], an in-memory frame source whose
//! frames are a pure function of the frame number, so results can be checked
//! pixel for pixel without FFmpeg or fixture files. [`SyntheticOpener`] turns
//! a small text header into such a video, which lets the upload path be
//! exercised end to end.

#![allow(dead_code)]

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use framepick::{
    FramePickError, FrameSource, Pipeline, PipelineOptions, ProgressCallback, ProgressInfo, VideoMetadata,
    VideoOpener,
};
use image::{Rgb, RgbImage};
use parking_lot::Mutex;

/// First token of a synthetic video file.
pub const SYNTHETIC_MAGIC: &str = "FPSYNTH";

/// Chunk size used by [`test_pipeline`].
pub const TEST_CHUNK_SIZE: u64 = 64;

/// Deterministic content of frame `frame_number`.
///
/// A 2×2-pixel checkerboard whose contrast and base level change with the
/// frame number, so sharpness and frame differences vary across the video.
pub fn render_frame(width: u32, height: u32, frame_number: u64) -> RgbImage {
    let contrast = (frame_number * 37 % 97) as u8 + 20;
    let base = 70 + (frame_number % 50) as u8;
    RgbImage::from_fn(width, height, |x, y| {
        let level = if (x / 2 + y / 2) % 2 == 0 {
            base.saturating_add(contrast)
        } else {
            base.saturating_sub(contrast)
        };
        Rgb([level, level / 2 + (x % 16) as u8, 255 - level])
    })
}

/// An in-memory video.
pub struct SyntheticVideo {
    metadata: VideoMetadata,
    failing: HashSet<u64>,
    delay: Duration,
    decoded: AtomicU64,
}

impl SyntheticVideo {
    pub fn new(width: u32, height: u32, frame_count: u64, fps: f64) -> Self {
        Self {
            metadata: VideoMetadata {
                width,
                height,
                fps,
                frame_count,
                codec: "synthetic".to_string(),
            },
            failing: HashSet::new(),
            delay: Duration::ZERO,
            decoded: AtomicU64::new(0),
        }
    }

    /// Make `frames` fail to decode.
    pub fn with_failing_frames(mut self, frames: impl IntoIterator<Item = u64>) -> Self {
        self.failing.extend(frames);
        self
    }

    /// Sleep for `delay` before every decode.
    pub fn with_decode_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Frames successfully decoded so far.
    pub fn decoded_frames(&self) -> u64 {
        self.decoded.load(Ordering::SeqCst)
    }
}

impl FrameSource for SyntheticVideo {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn decode_frame(&self, frame_number: u64) -> Result<RgbImage, FramePickError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.failing.contains(&frame_number) {
            return Err(FramePickError::VideoDecodeError(format!("corrupt frame {frame_number}")));
        }
        self.decoded.fetch_add(1, Ordering::SeqCst);
        Ok(render_frame(self.metadata.width, self.metadata.height, frame_number))
    }
}

/// Opens files that start with a `FPSYNTH width height frames fps` line.
#[derive(Default)]
pub struct SyntheticOpener {
    pub delay: Duration,
    pub failing: Vec<u64>,
}

impl SyntheticOpener {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            failing: Vec::new(),
        }
    }

    pub fn failing(frames: impl IntoIterator<Item = u64>) -> Self {
        Self {
            delay: Duration::ZERO,
            failing: frames.into_iter().collect(),
        }
    }
}

impl VideoOpener for SyntheticOpener {
    fn open(&self, path: &Path) -> Result<Arc<dyn FrameSource>, FramePickError> {
        let unreadable = |reason: &str| FramePickError::UnreadableVideo {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };
        let bytes = fs::read(path)?;
        let header_end = bytes.iter().position(|byte| *byte == b'\n').ok_or_else(|| unreadable("no header"))?;
        let header = std::str::from_utf8(&bytes[..header_end]).map_err(|_| unreadable("header is not text"))?;

        let fields: Vec<&str> = header.split_whitespace().collect();
        let [magic, width, height, frames, fps] = fields[..] else {
            return Err(unreadable("malformed header"));
        };
        if magic != SYNTHETIC_MAGIC {
            return Err(unreadable("not a synthetic video"));
        }
        let parse_error = |_| unreadable("non-numeric header field");
        let width: u32 = width.parse().map_err(parse_error)?;
        let height: u32 = height.parse().map_err(parse_error)?;
        let frames: u64 = frames.parse().map_err(parse_error)?;
        let fps: f64 = fps.parse().map_err(|_| unreadable("non-numeric fps"))?;
        if frames == 0 {
            return Err(unreadable("video has no frames"));
        }

        let video = SyntheticVideo::new(width, height, frames, fps)
            .with_failing_frames(self.failing.iter().copied())
            .with_decode_delay(self.delay);
        Ok(Arc::new(video))
    }
}

/// Bytes of a synthetic video file padded to at least `total_len` bytes.
pub fn synthetic_file_bytes(width: u32, height: u32, frame_count: u64, fps: f64, total_len: usize) -> Vec<u8> {
    let mut bytes = format!("{SYNTHETIC_MAGIC} {width} {height} {frame_count} {fps}\n").into_bytes();
    let mut filler = 0u32;
    while bytes.len() < total_len {
        bytes.push((filler * 31 % 251) as u8);
        filler += 1;
    }
    bytes
}

/// Write a synthetic video file into `directory`.
pub fn write_synthetic_video(directory: &Path, name: &str, width: u32, height: u32, frame_count: u64, fps: f64) -> PathBuf {
    let path = directory.join(name);
    fs::write(&path, synthetic_file_bytes(width, height, frame_count, fps, 0)).expect("write synthetic video");
    path
}

/// A pipeline over synthetic videos with [`TEST_CHUNK_SIZE`]-byte chunks.
pub fn test_pipeline(upload_root: &Path) -> Pipeline {
    pipeline_with_opener(upload_root, SyntheticOpener::default())
}

pub fn pipeline_with_opener(upload_root: &Path, opener: SyntheticOpener) -> Pipeline {
    pipeline_with_video_opener(upload_root, Arc::new(opener))
}

pub fn pipeline_with_video_opener(upload_root: &Path, opener: Arc<dyn VideoOpener>) -> Pipeline {
    Pipeline::new(PipelineOptions::new(upload_root).with_chunk_size(TEST_CHUNK_SIZE)).with_video_opener(opener)
}

/// Split `bytes` into upload chunks.
pub fn chunks(bytes: &[u8]) -> Vec<&[u8]> {
    bytes.chunks(TEST_CHUNK_SIZE as usize).collect()
}

/// Records every progress notification.
#[derive(Default)]
pub struct RecordingProgress {
    pub events: Mutex<Vec<ProgressInfo>>,
}

impl RecordingProgress {
    pub fn currents(&self) -> Vec<u64> {
        self.events.lock().iter().map(|info| info.current).collect()
    }
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.events.lock().push(info.clone());
    }
}
