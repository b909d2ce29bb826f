//! Rendering selected frames into a ZIP archive.
//!
//! An export is all-or-nothing: the request is validated up front, every
//! frame is decoded, graded and encoded, and only then is the archive
//! written. Any failure along the way returns an error and no archive.
//!
//! Entry names are `frame_{index:03}_{frame_number}{ext}` with a 1-based
//! index in selection order, so `[40, 12]` as PNG yields
//! `frame_001_40.png` and `frame_002_12.png`.

use std::{
    collections::HashSet,
    io::{Cursor, Write},
    sync::Arc,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::{
    encode::{ImageFormat, encode_image, validate_quality},
    error::FramePickError,
    lut::Lut,
    progress::{OperationType, ProgressCallback, ProgressTracker},
    video::FrameSource,
};

/// Quality used for lossy formats when a request does not set one.
pub const DEFAULT_EXPORT_QUALITY: u32 = 95;

fn default_format() -> String {
    "png".to_string()
}

fn default_quality() -> u32 {
    DEFAULT_EXPORT_QUALITY
}

/// A selection of frames plus export options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRequest {
    /// Frame numbers in selection order. Duplicates are exported once.
    pub frames: Vec<u64>,
    /// Format name (`png`, `jpg`/`jpeg`, `tiff`/`tif`, `webp`, `bmp`).
    #[serde(default = "default_format")]
    pub format: String,
    /// Quality for lossy formats, 1–100.
    #[serde(default = "default_quality")]
    pub quality: u32,
    /// Grade every frame through `lut_data`.
    #[serde(default)]
    pub apply_lut: bool,
    /// Contents of a `.cube` file.
    #[serde(default)]
    pub lut_data: Option<String>,
}

impl ExportRequest {
    /// A PNG export of `frames` with no grading.
    pub fn new(frames: Vec<u64>) -> Self {
        Self {
            frames,
            format: default_format(),
            quality: DEFAULT_EXPORT_QUALITY,
            apply_lut: false,
            lut_data: None,
        }
    }

    /// Set the output format by name.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Set the lossy quality.
    #[must_use]
    pub fn with_quality(mut self, quality: u32) -> Self {
        self.quality = quality;
        self
    }

    /// Grade frames with the given `.cube` text.
    #[must_use]
    pub fn with_lut(mut self, cube: impl Into<String>) -> Self {
        self.apply_lut = true;
        self.lut_data = Some(cube.into());
        self
    }
}

/// A validated export.
struct ExportPlan {
    frames: Vec<u64>,
    format: ImageFormat,
    quality: u32,
    lut: Option<Lut>,
}

/// Selection order with later duplicates removed.
pub(crate) fn unique_in_order(frames: &[u64]) -> Vec<u64> {
    let mut seen = HashSet::with_capacity(frames.len());
    frames.iter().copied().filter(|frame| seen.insert(*frame)).collect()
}

/// Archive entry name for the `index`-th (0-based) exported frame.
pub fn entry_name(index: usize, frame_number: u64, format: ImageFormat) -> String {
    format!("frame_{:03}_{}{}", index + 1, frame_number, format.extension())
}

/// Suggested download name for a job's archive.
pub fn archive_name(job_id: &str) -> String {
    let prefix: String = job_id.chars().take(8).collect();
    format!("screenshots_{prefix}.zip")
}

fn plan(request: &ExportRequest, total_frames: u64) -> Result<ExportPlan, FramePickError> {
    if request.frames.is_empty() {
        return Err(FramePickError::NoFramesSelected);
    }
    let format: ImageFormat = request.format.parse()?;
    validate_quality(format, request.quality)?;

    let frames = unique_in_order(&request.frames);
    if let Some(&frame_number) = frames.iter().find(|frame| **frame >= total_frames) {
        return Err(FramePickError::FrameOutOfRange {
            frame_number,
            total_frames,
        });
    }

    let lut = if request.apply_lut {
        let cube = request
            .lut_data
            .as_deref()
            .ok_or_else(|| FramePickError::MalformedLut("LUT requested but no LUT data supplied".to_string()))?;
        Some(Lut::parse(cube.as_bytes())?)
    } else {
        None
    };

    Ok(ExportPlan {
        frames,
        format,
        quality: request.quality,
        lut,
    })
}

/// Decode, grade and encode every requested frame, then package the results.
pub(crate) fn export_frames(
    source: &dyn FrameSource,
    request: &ExportRequest,
    progress: Arc<dyn ProgressCallback>,
) -> Result<Vec<u8>, FramePickError> {
    let plan = plan(request, source.metadata().frame_count)?;
    log::debug!(
        "Exporting {} frames as {} (quality {}, lut: {})",
        plan.frames.len(),
        plan.format,
        plan.quality,
        plan.lut.is_some()
    );

    let tracker = Mutex::new(ProgressTracker::new(progress, OperationType::Export, plan.frames.len() as u64));
    let render = |index: usize, frame_number: &u64| -> Result<(String, Vec<u8>), FramePickError> {
        let frame = source.frame(*frame_number)?;
        let frame = match &plan.lut {
            Some(lut) => lut.apply(&frame),
            None => frame,
        };
        let bytes = encode_image(&frame, plan.format, plan.quality)?;
        tracker.lock().advance(Some(*frame_number));
        Ok((entry_name(index, *frame_number, plan.format), bytes))
    };

    #[cfg(feature = "rayon")]
    let rendered = crate::rayon::try_map_ordered(&plan.frames, render)?;

    #[cfg(not(feature = "rayon"))]
    let rendered = plan
        .frames
        .iter()
        .enumerate()
        .map(|(index, frame_number)| render(index, frame_number))
        .collect::<Result<Vec<_>, _>>()?;

    let archive = write_archive(&rendered)?;
    log::info!("Export archive written: {} entries, {} bytes", rendered.len(), archive.len());
    Ok(archive)
}

fn write_archive(entries: &[(String, Vec<u8>)]) -> Result<Vec<u8>, FramePickError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in entries {
        writer.start_file(name.as_str(), options)?;
        writer.write_all(bytes)?;
    }
    Ok(writer.finish()?.into_inner())
}
