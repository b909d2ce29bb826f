//! # framepick
//!
//! Pick production-ready still frames out of long videos.
//!
//! `framepick` is the processing core behind a frame-selection tool for
//! podcasts, interviews and B-roll. It reassembles chunked uploads, decodes
//! arbitrary frames for scrubbing, ranks frames by face presence, sharpness
//! and stability in the background, grades frames through `.cube` LUTs, and
//! exports the selection as a ZIP of images. Decoding is powered by FFmpeg
//! via the [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ### Rank the best frames of a local video
//!
//! ```no_run
//! use framepick::{AnalysisRequest, AnalysisStatus, Pipeline, PipelineOptions};
//!
//! let pipeline = Pipeline::new(PipelineOptions::new("/tmp/framepick"));
//! let job_id = pipeline.register_video("interview.mp4").unwrap();
//! pipeline
//!     .start_analysis(&job_id, &AnalysisRequest::new(8, "interview"))
//!     .unwrap()
//!     .wait();
//!
//! if let AnalysisStatus::Analyzed { frames } = pipeline.analysis_status(&job_id).unwrap() {
//!     for frame in frames {
//!         println!("{} {:.3}", frame.frame_number, frame.score);
//!     }
//! }
//! ```
//!
//! ### Grade a frame through a LUT
//!
//! ```no_run
//! use framepick::{FfmpegOpener, Lut, VideoOpener};
//!
//! let lut = Lut::parse(&std::fs::read("film.cube").unwrap()).unwrap();
//! let video = FfmpegOpener.open("clip.mov".as_ref()).unwrap();
//! lut.apply(&video.frame(240).unwrap()).save("graded.png").unwrap();
//! ```
//!
//! ## Features
//!
//! - **Chunked uploads**: offset-addressed, idempotent chunk writes into a
//!   pre-sized file; the last chunk finalizes the upload
//! - **Random-access frames**: seek to the nearest keyframe, decode forward
//! - **Quality analysis**: duration-aware sampling, Laplacian sharpness,
//!   frame-difference stability, pluggable face detection, per-project
//!   weighting profiles, spaced top-K selection
//! - **Supersession**: restarting an analysis cancels the previous run
//! - **LUT grading**: `.cube` 3D LUTs with trilinear interpolation
//! - **Export**: PNG, JPG, TIFF, WebP and BMP packaged into a ZIP archive
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | Parallel LUT application and export rendering (default) |
//! | `async` | `export_async` / `preview_async` on Tokio's blocking pool |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod analysis;
pub mod configuration;
mod conversion;
pub mod encode;
pub mod error;
pub mod export;
pub mod ffmpeg;
pub mod job;
pub mod lut;
pub mod metadata;
pub mod pipeline;
pub mod profile;
pub mod progress;
#[cfg(feature = "rayon")]
mod rayon;
pub mod scoring;
pub mod upload;
pub mod video;

pub use analysis::{AnalysisRequest, AnalysisStatus, FrameCandidate, default_spacing, sample_plan, select_frames};
pub use configuration::{AnalysisOptions, PipelineOptions};
pub use conversion::{format_timestamp, frame_number_to_seconds};
pub use encode::{ImageFormat, encode_image};
pub use error::{ErrorBody, FramePickError};
pub use export::{ExportRequest, archive_name, entry_name};
pub use ffmpeg::{FfmpegLogLevel, FfmpegOpener, FfmpegVideo, set_ffmpeg_log_level};
pub use job::{Job, JobRegistry, JobState};
pub use lut::{Lut, LutParseMode};
pub use metadata::{VideoInfo, VideoMetadata};
pub use pipeline::{AnalysisHandle, Pipeline};
pub use profile::{ProfileTable, ProjectProfile};
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use scoring::{FaceDetection, FaceDetector, NoFaceDetector};
pub use upload::{ChunkAck, UploadStatus, UploadTicket};
pub use video::{FrameSource, VideoOpener};
