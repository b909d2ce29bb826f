//! Internal conversion helpers.
//!
//! Pixel-data copying, timestamp/frame-number conversion, and timestamp
//! formatting shared by the indexer, analyzer, and CLI.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Copy RGB24 pixel data from an FFmpeg frame into a tightly-packed buffer,
/// dropping any per-row stride padding.
pub(crate) fn frame_to_rgb_buffer(video_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_bytes = (width as usize) * 3;
    let data = video_frame.data(0);

    if stride == row_bytes {
        data[..row_bytes * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_bytes * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + row_bytes]);
        }
        buffer
    }
}

/// Rescale a PTS value from stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Rescale a PTS value to a frame number.
///
/// Rounds to the nearest frame so PTS jitter of a fraction of a frame does
/// not shift the index.
pub(crate) fn pts_to_frame_number(pts: i64, time_base: Rational, frames_per_second: f64) -> u64 {
    let frame = pts_to_seconds(pts, time_base) * frames_per_second;
    if frame <= 0.0 { 0 } else { frame.round() as u64 }
}

/// Convert a frame number to a container seek timestamp in AV_TIME_BASE
/// (microseconds).
pub(crate) fn frame_number_to_seek_timestamp(frame_number: u64, frames_per_second: f64) -> i64 {
    let seconds = frame_number as f64 / frames_per_second;
    (seconds * 1_000_000.0) as i64
}

/// Seconds offset of a frame.
pub fn frame_number_to_seconds(frame_number: u64, frames_per_second: f64) -> f64 {
    if frames_per_second > 0.0 {
        frame_number as f64 / frames_per_second
    } else {
        0.0
    }
}

/// Format seconds as `MM:SS.cc`, or `HH:MM:SS.cc` when at least an hour.
///
/// ```
/// assert_eq!(framepick::format_timestamp(75.5), "01:15.50");
/// assert_eq!(framepick::format_timestamp(3723.25), "01:02:03.25");
/// ```
pub fn format_timestamp(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let total_centis = (seconds * 100.0).round() as u64;
    let centis = total_centis % 100;
    let total_seconds = total_centis / 100;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}.{centis:02}")
    } else {
        format!("{minutes:02}:{secs:02}.{centis:02}")
    }
}
