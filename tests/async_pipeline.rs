//! Tests for the tokio wrappers (`async` feature).

#![cfg(feature = "async")]

mod common;

use std::sync::Arc;

use common::{render_frame, test_pipeline, write_synthetic_video};
use framepick::{ExportRequest, FramePickError};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn export_async_matches_blocking_export() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let pipeline = Arc::new(test_pipeline(dir.path()));
    let path = write_synthetic_video(dir.path(), "clip.mp4", 32, 24, 20, 25.0);
    let job_id = pipeline.register_video(&path).unwrap();

    let request = ExportRequest::new(vec![4, 9]);
    let blocking = pipeline.export(&job_id, &request).unwrap();
    let background = pipeline.export_async(&job_id, request).await.unwrap();
    assert_eq!(entries(blocking), entries(background));
}

fn entries(archive: Vec<u8>) -> Vec<(String, Vec<u8>)> {
    use std::io::Read;

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(archive)).unwrap();
    (0..archive.len())
        .map(|index| {
            let mut entry = archive.by_index(index).unwrap();
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents).unwrap();
            (entry.name().to_string(), contents)
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn preview_async_decodes_frame() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let pipeline = Arc::new(test_pipeline(dir.path()));
    let path = write_synthetic_video(dir.path(), "clip.mp4", 32, 24, 20, 25.0);
    let job_id = pipeline.register_video(&path).unwrap();

    let preview = pipeline.preview_async(&job_id, 3).await.unwrap();
    let image = image::load_from_memory(&preview).unwrap().to_rgb8();
    assert_eq!(image.dimensions(), render_frame(32, 24, 3).dimensions());
}

#[tokio::test]
async fn async_errors_propagate() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let pipeline = Arc::new(test_pipeline(dir.path()));

    assert!(matches!(
        pipeline.preview_async("missing", 0).await,
        Err(FramePickError::UnknownJob(_))
    ));
}
