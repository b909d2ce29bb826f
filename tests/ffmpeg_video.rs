//! FFmpeg-backed frame source tests.
//!
//! Tests that decode real video require fixture files from
//! `tests/fixtures/generate_fixtures.sh` and return early when they are
//! missing.

use std::{path::Path, sync::Arc};

use framepick::{
    AnalysisRequest, AnalysisStatus, ExportRequest, FfmpegLogLevel, FfmpegOpener, FfmpegVideo, FramePickError,
    FrameSource, Pipeline, PipelineOptions, VideoOpener,
};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

fn wide_video_path() -> &'static str {
    "tests/fixtures/wide_video.mp4"
}

// ── Opening ────────────────────────────────────────────────────────

#[test]
fn open_missing_file() {
    let result = FfmpegVideo::open("tests/fixtures/does_not_exist.mp4");
    assert!(matches!(result, Err(FramePickError::UnreadableVideo { .. })));
}

#[test]
fn open_garbage_file() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("garbage.mp4");
    std::fs::write(&path, vec![0x5Au8; 4096]).unwrap();

    let result = FfmpegOpener.open(&path);
    assert!(matches!(result, Err(FramePickError::UnreadableVideo { .. })));
}

#[test]
fn register_garbage_file() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("notes.bin");
    std::fs::write(&path, "definitely not a video").unwrap();

    let pipeline = Pipeline::new(PipelineOptions::new(dir.path()));
    assert!(matches!(
        pipeline.register_video(&path),
        Err(FramePickError::UnreadableVideo { .. })
    ));
    assert!(pipeline.registry().is_empty());
}

#[test]
fn log_level_names() {
    assert_eq!(FfmpegLogLevel::from_name("quiet"), Some(FfmpegLogLevel::Quiet));
    assert_eq!(FfmpegLogLevel::from_name("WARNING"), Some(FfmpegLogLevel::Warning));
    assert_eq!(FfmpegLogLevel::from_name("chatty"), None);
}

#[test]
fn open_sample_metadata() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let video = FfmpegVideo::open(path).expect("Failed to open sample video");
    let metadata = video.metadata();
    assert_eq!(metadata.width, 640);
    assert_eq!(metadata.height, 480);
    assert!((metadata.fps - 30.0).abs() < 0.01);
    assert!(metadata.frame_count >= 299 && metadata.frame_count <= 301);
    assert_eq!(metadata.codec, "h264");
}

// ── Frame retrieval ────────────────────────────────────────────────

#[test]
fn decode_frames_at_full_resolution() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let video = FfmpegVideo::open(path).expect("Failed to open sample video");
    for frame_number in [0, 1, 29, 30, 150, video.metadata().frame_count - 1] {
        let frame = video.frame(frame_number).expect("Failed to decode frame");
        assert_eq!(frame.dimensions(), (640, 480), "frame {frame_number}");
    }
}

#[test]
fn decoding_is_repeatable() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let video = FfmpegVideo::open(path).expect("Failed to open sample video");
    let first = video.frame(75).unwrap();
    let _ = video.frame(10).unwrap();
    let again = video.frame(75).unwrap();
    assert_eq!(first, again);
    assert_ne!(first, video.frame(200).unwrap());
}

#[test]
fn frame_out_of_range() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let video = FfmpegVideo::open(path).expect("Failed to open sample video");
    let total_frames = video.metadata().frame_count;
    assert!(matches!(
        video.frame(total_frames),
        Err(FramePickError::FrameOutOfRange { frame_number, .. }) if frame_number == total_frames
    ));
}

#[test]
fn concurrent_decoding() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let video: Arc<dyn FrameSource> = FfmpegOpener.open(Path::new(path)).expect("Failed to open sample video");
    let workers: Vec<_> = (0..4u64)
        .map(|worker| {
            let video = Arc::clone(&video);
            std::thread::spawn(move || video.frame(worker * 60 + 5).map(|frame| frame.dimensions()))
        })
        .collect();
    for worker in workers {
        assert_eq!(worker.join().unwrap().unwrap(), (640, 480));
    }
}

// ── Pipeline ───────────────────────────────────────────────────────

#[test]
fn preview_is_limited_to_preview_width() {
    let path = wide_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let pipeline = Pipeline::new(PipelineOptions::new(dir.path()));
    let job_id = pipeline.register_video(path).unwrap();

    let preview = pipeline.preview(&job_id, 50).unwrap();
    let image = image::load_from_memory(&preview).unwrap();
    assert_eq!((image.width(), image.height()), (800, 450));
}

#[test]
fn analyze_and_export_sample() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let pipeline = Pipeline::new(PipelineOptions::new(dir.path()));
    let job_id = pipeline.register_video(path).unwrap();

    pipeline
        .start_analysis(&job_id, &AnalysisRequest::new(3, "b-roll"))
        .unwrap()
        .wait();
    let AnalysisStatus::Analyzed { frames } = pipeline.analysis_status(&job_id).unwrap() else {
        panic!("analysis did not finish");
    };
    assert_eq!(frames.len(), 3);

    let selection: Vec<u64> = frames.iter().map(|frame| frame.frame_number).collect();
    let archive = pipeline
        .export(&job_id, &ExportRequest::new(selection).with_format("jpg").with_quality(80))
        .unwrap();
    let archive = zip::ZipArchive::new(std::io::Cursor::new(archive)).unwrap();
    assert_eq!(archive.len(), 3);
}
