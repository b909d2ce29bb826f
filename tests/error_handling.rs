//! Error kinds, transport bodies, and the JSON shapes clients poll.

use std::path::PathBuf;

use framepick::{
    AnalysisRequest, AnalysisStatus, ErrorBody, ExportRequest, FrameCandidate, FramePickError, JobState, VideoInfo,
    VideoMetadata, format_timestamp, frame_number_to_seconds,
};

// ── Error kinds ────────────────────────────────────────────────────

#[test]
fn test_error_kinds_are_stable() {
    let cases: Vec<(FramePickError, &str)> = vec![
        (FramePickError::InvalidSize { size: 0, max: 10 }, "invalid_size"),
        (FramePickError::UnknownJob("x".into()), "unknown_job"),
        (
            FramePickError::ChunkOutOfRange {
                chunk_index: 4,
                total_chunks: 4,
            },
            "chunk_out_of_range",
        ),
        (
            FramePickError::InvalidChunk {
                chunk_index: 1,
                reason: "short".into(),
            },
            "invalid_chunk",
        ),
        (
            FramePickError::UnreadableVideo {
                path: PathBuf::from("a.mp4"),
                reason: "garbage".into(),
            },
            "unreadable_video",
        ),
        (
            FramePickError::FrameOutOfRange {
                frame_number: 10,
                total_frames: 10,
            },
            "frame_out_of_range",
        ),
        (FramePickError::VideoNotReady("x".into()), "video_not_ready"),
        (FramePickError::MalformedLut("bad".into()), "malformed_lut"),
        (FramePickError::NoFramesSelected, "no_frames_selected"),
        (FramePickError::InvalidFormat("gif".into()), "invalid_format"),
        (FramePickError::InvalidQuality(0), "invalid_quality"),
        (FramePickError::InvalidFrameCount, "invalid_frame_count"),
        (FramePickError::WorkerPanicked("boom".into()), "worker_panicked"),
        (FramePickError::Cancelled, "cancelled"),
    ];
    for (error, kind) in cases {
        assert_eq!(error.kind(), kind, "{error}");
    }
}

#[test]
fn test_client_and_server_errors() {
    assert!(FramePickError::NoFramesSelected.is_client_error());
    assert!(FramePickError::UnknownJob("x".into()).is_client_error());
    assert!(FramePickError::InvalidQuality(101).is_client_error());
    assert!(!FramePickError::VideoDecodeError("boom".into()).is_client_error());
    assert!(!FramePickError::WorkerPanicked("boom".into()).is_client_error());
    assert!(!FramePickError::from(std::io::Error::other("disk full")).is_client_error());
}

#[test]
fn test_error_messages_are_actionable() {
    let error = FramePickError::FrameOutOfRange {
        frame_number: 120,
        total_frames: 100,
    };
    assert_eq!(error.to_string(), "Frame 120 is out of range (video has 100 frames)");

    let error = FramePickError::InvalidQuality(0);
    assert!(error.to_string().contains("between 1 and 100"));
}

#[test]
fn test_io_error_conversion() {
    let error: FramePickError = std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
    assert_eq!(error.kind(), "io_error");
}

#[test]
fn test_error_body_json() {
    let error = FramePickError::MalformedLut("missing LUT_3D_SIZE".into());
    let body = ErrorBody::from(&error);
    assert_eq!(body.kind, "malformed_lut");

    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json["kind"], "malformed_lut");
    assert_eq!(json["error"], "Malformed LUT: missing LUT_3D_SIZE");
}

// ── Status shapes ──────────────────────────────────────────────────

#[test]
fn test_analysis_status_json() {
    let idle = serde_json::to_value(AnalysisStatus::Idle).unwrap();
    assert_eq!(idle, serde_json::json!({"status": "idle"}));

    let running = serde_json::to_value(AnalysisStatus::Analyzing { progress: 3, total: 40 }).unwrap();
    assert_eq!(running, serde_json::json!({"status": "analyzing", "progress": 3, "total": 40}));

    let failed = serde_json::to_value(AnalysisStatus::Error { error: "boom".into() }).unwrap();
    assert_eq!(failed, serde_json::json!({"status": "error", "error": "boom"}));

    let done = serde_json::to_value(AnalysisStatus::Analyzed {
        frames: vec![FrameCandidate {
            frame_number: 48,
            timestamp_seconds: 2.0,
            score: 0.75,
            face_score: 0.5,
            sharpness_score: 1.0,
            stability_score: 0.75,
            is_manual: false,
        }],
    })
    .unwrap();
    assert_eq!(done["status"], "analyzed");
    assert_eq!(done["frames"][0]["frame_number"], 48);
    assert_eq!(done["frames"][0]["timestamp_seconds"], 2.0);
    assert_eq!(done["frames"][0]["is_manual"], false);
}

#[test]
fn test_job_state_json() {
    assert_eq!(serde_json::to_string(&JobState::Uploading).unwrap(), "\"uploading\"");
    assert_eq!(serde_json::to_string(&JobState::Analyzed).unwrap(), "\"analyzed\"");
}

#[test]
fn test_request_defaults_from_json() {
    let analysis: AnalysisRequest = serde_json::from_str("{}").unwrap();
    assert_eq!(analysis, AnalysisRequest::new(5, "podcast"));

    let export: ExportRequest = serde_json::from_str(r#"{"frames": [1, 2]}"#).unwrap();
    assert_eq!(export.format, "png");
    assert_eq!(export.quality, 95);
    assert!(!export.apply_lut);
    assert!(export.lut_data.is_none());
}

// ── Metadata ───────────────────────────────────────────────────────

#[test]
fn test_video_info_from_metadata() {
    let metadata = VideoMetadata {
        width: 1920,
        height: 1080,
        fps: 25.0,
        frame_count: 93_750,
        codec: "h264".to_string(),
    };
    assert!(metadata.contains(93_749));
    assert!(!metadata.contains(93_750));

    let info = VideoInfo::from(&metadata);
    assert_eq!(info.duration, 3750.0);
    assert_eq!(info.duration_formatted, "01:02:30.00");
    assert_eq!(info.codec, "h264");
}

#[test]
fn test_timestamps() {
    assert_eq!(format_timestamp(0.0), "00:00.00");
    assert_eq!(format_timestamp(83.5), "01:23.50");
    assert_eq!(format_timestamp(3661.25), "01:01:01.25");
    assert!((frame_number_to_seconds(90, 30.0) - 3.0).abs() < 1e-12);
    assert_eq!(frame_number_to_seconds(90, 0.0), 0.0);
}
