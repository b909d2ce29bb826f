//! Per-frame quality measurements.
//!
//! All measurements run on a grayscale copy of the frame downscaled to the
//! configured analysis width, so their cost does not grow with source
//! resolution.

use image::{GrayImage, RgbImage, imageops::FilterType};

/// Mean absolute gray-level difference treated as "completely different".
pub const FRAME_DIFFERENCE_SCALE: f64 = 50.0;

/// Laplacian variance rated as fully sharp when a frame is scored on its own.
pub const ABSOLUTE_SHARPNESS_SCALE: f64 = 500.0;

/// A face found by a [`FaceDetector`], in pixels of the frame it was
/// detected on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceDetection {
    /// Left edge of the bounding box.
    pub x: f32,
    /// Top edge of the bounding box.
    pub y: f32,
    /// Bounding box width.
    pub width: f32,
    /// Bounding box height.
    pub height: f32,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f32,
}

/// Face detection capability consumed by the analyzer.
///
/// The crate ships no detector of its own; plug one in through
/// [`Pipeline::with_face_detector`](crate::Pipeline::with_face_detector).
pub trait FaceDetector: Send + Sync {
    /// Detect faces in `frame`.
    fn detect(&self, frame: &RgbImage) -> Vec<FaceDetection>;
}

/// A detector that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFaceDetector;

impl FaceDetector for NoFaceDetector {
    fn detect(&self, _frame: &RgbImage) -> Vec<FaceDetection> {
        Vec::new()
    }
}

/// Downscale `frame` to at most `analysis_width` pixels wide and convert it
/// to grayscale.
pub fn prepare_gray(frame: &RgbImage, analysis_width: u32) -> GrayImage {
    let (width, height) = frame.dimensions();
    let gray = image::imageops::grayscale(frame);
    if width <= analysis_width || width == 0 {
        return gray;
    }
    let new_height = ((u64::from(height) * u64::from(analysis_width)) / u64::from(width)).max(1) as u32;
    image::imageops::resize(&gray, analysis_width, new_height, FilterType::Triangle)
}

/// Variance of the 4-neighbour Laplacian over the interior of `gray`.
///
/// Higher values mean more edge energy, i.e. a sharper frame. Images smaller
/// than 3×3 have no interior and score 0.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }
    let at = |x: u32, y: u32| f64::from(gray.get_pixel(x, y)[0]);

    let mut sum = 0.0;
    let mut sum_squares = 0.0;
    let mut count = 0.0;
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let response = at(x - 1, y) + at(x + 1, y) + at(x, y - 1) + at(x, y + 1) - 4.0 * at(x, y);
            sum += response;
            sum_squares += response * response;
            count += 1.0;
        }
    }
    let mean = sum / count;
    (sum_squares / count - mean * mean).max(0.0)
}

/// Mean absolute gray-level difference between two frames.
///
/// `b` is resized to `a`'s dimensions when they differ.
pub fn mean_abs_difference(a: &GrayImage, b: &GrayImage) -> f64 {
    let resized;
    let b = if a.dimensions() == b.dimensions() {
        b
    } else {
        resized = image::imageops::resize(b, a.width(), a.height(), FilterType::Triangle);
        &resized
    };
    let pixels = a.as_raw().len();
    if pixels == 0 {
        return 0.0;
    }
    let total: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(left, right)| u64::from(left.abs_diff(*right)))
        .sum();
    total as f64 / pixels as f64
}

/// Stability contribution of one neighbour: `1 − min(1, diff / 50)`.
pub fn stability_from_difference(mean_difference: f64) -> f64 {
    1.0 - (mean_difference / FRAME_DIFFERENCE_SCALE).min(1.0)
}

/// Sharpness in `[0, 1]` from a Laplacian variance, without reference to
/// other frames.
pub fn absolute_sharpness(laplacian_variance: f64) -> f64 {
    (laplacian_variance.max(0.0) / ABSOLUTE_SHARPNESS_SCALE).min(1.0)
}

/// Score the faces found in a `width × height` frame.
///
/// The best single face is rated on size (`min(1, area_ratio · 10)`),
/// centering and detector confidence, weighted 0.35 / 0.35 / 0.3. Each extra
/// face adds 0.075, capped at 0.15. The result is clamped to `[0, 1]`.
pub fn face_score(faces: &[FaceDetection], width: u32, height: u32) -> f64 {
    if faces.is_empty() || width == 0 || height == 0 {
        return 0.0;
    }
    let frame_width = f64::from(width);
    let frame_height = f64::from(height);
    let frame_area = frame_width * frame_height;
    let half_width = frame_width / 2.0;
    let half_height = frame_height / 2.0;

    let best = faces
        .iter()
        .map(|face| {
            let face_width = f64::from(face.width.max(0.0));
            let face_height = f64::from(face.height.max(0.0));
            let size_score = ((face_width * face_height / frame_area) * 10.0).min(1.0);

            let center_x = f64::from(face.x) + face_width / 2.0;
            let center_y = f64::from(face.y) + face_height / 2.0;
            let dx = ((center_x - half_width).abs() / half_width).min(1.0);
            let dy = ((center_y - half_height).abs() / half_height).min(1.0);
            let position_score = 1.0 - (dx * 0.5 + dy * 0.5);

            let confidence = f64::from(face.confidence).clamp(0.0, 1.0);
            size_score * 0.35 + position_score * 0.35 + confidence * 0.3
        })
        .fold(0.0f64, f64::max);

    let bonus = ((faces.len() - 1) as f64 * 0.075).min(0.15);
    (best + bonus).clamp(0.0, 1.0)
}

/// Raw measurements of one sampled frame, before cross-sample
/// normalization.
#[derive(Debug, Clone)]
pub(crate) struct SampleMeasurement {
    pub(crate) frame_number: u64,
    pub(crate) face_score: f64,
    pub(crate) faces_found: bool,
    pub(crate) raw_sharpness: f64,
    /// Mean absolute difference to the previously measured sample.
    pub(crate) difference_to_previous: Option<f64>,
}

/// Measure one decoded frame against the previous sample's grayscale copy.
///
/// Returns the measurement together with this frame's grayscale copy, which
/// the caller hands back in as `previous` for the next sample.
pub(crate) fn measure_frame(
    frame_number: u64,
    frame: &RgbImage,
    analysis_width: u32,
    detector: Option<&dyn FaceDetector>,
    previous: Option<&GrayImage>,
) -> (SampleMeasurement, GrayImage) {
    let gray = prepare_gray(frame, analysis_width);
    let raw_sharpness = laplacian_variance(&gray);
    let (face_score, faces_found) = match detector {
        Some(detector) => {
            let faces = detector.detect(frame);
            (face_score(&faces, frame.width(), frame.height()), !faces.is_empty())
        }
        None => (0.0, false),
    };
    let difference_to_previous = previous.map(|previous| mean_abs_difference(&gray, previous));
    let measurement = SampleMeasurement {
        frame_number,
        face_score,
        faces_found,
        raw_sharpness,
        difference_to_previous,
    };
    (measurement, gray)
}
