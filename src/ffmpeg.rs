//! FFmpeg-backed video indexing.
//!
//! [`FfmpegOpener`] opens a container with `ffmpeg-next`, picks the best video
//! stream and extracts [`VideoMetadata`]. The resulting [`FfmpegVideo`] decodes
//! any frame by seeking to the preceding keyframe and decoding forward.
//!
//! Demuxer contexts cannot be shared between threads mid-decode, so each
//! [`FfmpegVideo`] keeps a small pool of opened inputs. A decode borrows one
//! input for its duration and returns it afterwards; concurrent decodes open
//! extra inputs on demand.
//!
//! FFmpeg's own stderr chatter is controlled separately through
//! [`set_ffmpeg_log_level`]; it is unaffected by the `log` crate.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use ffmpeg_next::{
    codec::context::Context as CodecContext,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
    util::log::Level,
};
use image::RgbImage;
use parking_lot::Mutex;

use crate::{
    conversion::{frame_number_to_seek_timestamp, frame_to_rgb_buffer, pts_to_frame_number},
    error::FramePickError,
    metadata::VideoMetadata,
    video::{FrameSource, VideoOpener},
};

/// Largest number of idle demuxer contexts kept per video.
const MAX_POOLED_INPUTS: usize = 4;

/// FFmpeg's own log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// No output at all.
    Quiet,
    /// Unrecoverable errors only.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings (FFmpeg's default).
    Warning,
    /// Informational messages.
    Info,
    /// Debugging output.
    Debug,
}

impl FfmpegLogLevel {
    fn to_ffmpeg_level(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Debug => Level::Debug,
        }
    }

    /// Parse a level name such as `"error"` or `"quiet"` (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "quiet" => Some(FfmpegLogLevel::Quiet),
            "fatal" => Some(FfmpegLogLevel::Fatal),
            "error" => Some(FfmpegLogLevel::Error),
            "warning" | "warn" => Some(FfmpegLogLevel::Warning),
            "info" => Some(FfmpegLogLevel::Info),
            "debug" => Some(FfmpegLogLevel::Debug),
            _ => None,
        }
    }
}

/// Set FFmpeg's internal log verbosity.
///
/// ```no_run
/// use framepick::FfmpegLogLevel;
///
/// framepick::set_ffmpeg_log_level(FfmpegLogLevel::Error);
/// ```
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

/// Opens videos with FFmpeg.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegOpener;

impl VideoOpener for FfmpegOpener {
    fn open(&self, path: &Path) -> Result<Arc<dyn FrameSource>, FramePickError> {
        Ok(Arc::new(FfmpegVideo::open(path)?))
    }
}

/// A video opened with FFmpeg.
pub struct FfmpegVideo {
    path: PathBuf,
    metadata: VideoMetadata,
    stream_index: usize,
    pool: Mutex<Vec<Input>>,
}

impl std::fmt::Debug for FfmpegVideo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegVideo")
            .field("path", &self.path)
            .field("metadata", &self.metadata)
            .field("stream_index", &self.stream_index)
            .finish_non_exhaustive()
    }
}

impl FfmpegVideo {
    /// Open `path` and extract metadata from its best video stream.
    ///
    /// # Errors
    ///
    /// [`FramePickError::UnreadableVideo`] if FFmpeg cannot parse the
    /// container, it holds no video stream, or the stream has no frames.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FramePickError> {
        let path = path.as_ref().to_path_buf();
        let unreadable = |reason: String| FramePickError::UnreadableVideo {
            path: path.clone(),
            reason,
        };

        log::debug!("Opening video: {}", path.display());

        ffmpeg_next::init().map_err(|error| unreadable(format!("FFmpeg initialisation failed: {error}")))?;
        let input = ffmpeg_next::format::input(&path).map_err(|error| unreadable(error.to_string()))?;

        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or_else(|| unreadable("no video stream".to_string()))?;
        let stream_index = stream.index();

        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| unreadable(format!("cannot create video decoder: {error}")))?;

        let fps = rational_to_f64(stream.avg_frame_rate())
            .or_else(|| rational_to_f64(stream.rate()))
            .ok_or_else(|| unreadable("unknown frame rate".to_string()))?;

        let frame_count = if stream.frames() > 0 {
            stream.frames() as u64
        } else {
            let stream_duration = if stream.duration() > 0 {
                stream.duration() as f64 * f64::from(stream.time_base())
            } else {
                input.duration().max(0) as f64 / f64::from(ffmpeg_next::ffi::AV_TIME_BASE)
            };
            (stream_duration * fps) as u64
        };
        if frame_count == 0 {
            return Err(unreadable("video stream contains no frames".to_string()));
        }

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            frame_count,
            codec,
        };
        log::info!(
            "Opened {}: {}x{} @ {:.3} fps, {} frames ({})",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.frame_count,
            metadata.codec
        );

        Ok(Self {
            path,
            metadata,
            stream_index,
            pool: Mutex::new(vec![input]),
        })
    }

    fn checkout(&self) -> Result<Input, FramePickError> {
        if let Some(input) = self.pool.lock().pop() {
            return Ok(input);
        }
        log::debug!("Opening additional demuxer for {}", self.path.display());
        ffmpeg_next::format::input(&self.path).map_err(|error| FramePickError::UnreadableVideo {
            path: self.path.clone(),
            reason: error.to_string(),
        })
    }

    fn checkin(&self, input: Input) {
        let mut pool = self.pool.lock();
        if pool.len() < MAX_POOLED_INPUTS {
            pool.push(input);
        }
    }

    fn decode_with(&self, input: &mut Input, frame_number: u64) -> Result<RgbImage, FramePickError> {
        let stream = input
            .stream(self.stream_index)
            .ok_or_else(|| FramePickError::VideoDecodeError("video stream disappeared".to_string()))?;
        let time_base = stream.time_base();
        let mut decoder = CodecContext::from_parameters(stream.parameters())?.decoder().video()?;

        let width = self.metadata.width;
        let height = self.metadata.height;
        let fps = self.metadata.fps;

        let mut scaler = ScalingContext::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            width,
            height,
            ScalingFlags::BILINEAR,
        )?;

        let target_timestamp = frame_number_to_seek_timestamp(frame_number, fps);
        log::debug!("Seeking to frame {frame_number} (ts {target_timestamp})");
        input.seek(target_timestamp, ..target_timestamp)?;

        let mut decoded = VideoFrame::empty();
        let mut rgb = VideoFrame::empty();

        for (stream, packet) in input.packets() {
            if stream.index() != self.stream_index {
                continue;
            }
            decoder.send_packet(&packet)?;
            while decoder.receive_frame(&mut decoded).is_ok() {
                let pts = decoded.pts().or(decoded.timestamp()).unwrap_or(0);
                if pts_to_frame_number(pts, time_base, fps) >= frame_number {
                    scaler.run(&decoded, &mut rgb)?;
                    return to_image(&rgb, width, height);
                }
            }
        }

        decoder.send_eof()?;
        let mut last_seen = false;
        while decoder.receive_frame(&mut decoded).is_ok() {
            last_seen = true;
            scaler.run(&decoded, &mut rgb)?;
            let pts = decoded.pts().or(decoded.timestamp()).unwrap_or(0);
            if pts_to_frame_number(pts, time_base, fps) >= frame_number {
                return to_image(&rgb, width, height);
            }
        }

        // Frame counts derived from duration can overshoot by a frame or two;
        // the last decoded frame answers for them.
        if last_seen {
            return to_image(&rgb, width, height);
        }

        Err(FramePickError::VideoDecodeError(format!(
            "could not locate frame {frame_number} in {}",
            self.path.display()
        )))
    }
}

impl FrameSource for FfmpegVideo {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn decode_frame(&self, frame_number: u64) -> Result<RgbImage, FramePickError> {
        let mut input = self.checkout()?;
        let result = self.decode_with(&mut input, frame_number);
        self.checkin(input);
        result
    }
}

fn rational_to_f64(rational: ffmpeg_next::Rational) -> Option<f64> {
    if rational.denominator() != 0 && rational.numerator() > 0 {
        Some(f64::from(rational.numerator()) / f64::from(rational.denominator()))
    } else {
        None
    }
}

fn to_image(rgb: &VideoFrame, width: u32, height: u32) -> Result<RgbImage, FramePickError> {
    let buffer = frame_to_rgb_buffer(rgb, width, height);
    RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| FramePickError::VideoDecodeError("decoded frame has unexpected size".to_string()))
}
