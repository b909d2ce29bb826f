//! Chunked upload reassembly.
//!
//! [`UploadManager::init`] reserves a job and a backing file pre-sized to the
//! full upload. Each chunk is written at `chunk_index × chunk_size` through its
//! own file handle, so disjoint chunks never contend for a lock. Only the
//! bookkeeping (which chunks have arrived, who finalizes) sits behind the
//! session mutex.
//!
//! When the last missing chunk lands, exactly one caller wins the right to
//! finalize: it flushes the file, opens the video, and moves the job to
//! [`JobState::Ready`](crate::JobState::Ready).

use std::{
    collections::HashSet,
    fs::{self, File, OpenOptions},
    io::{Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use serde::Serialize;

use crate::{
    error::FramePickError,
    job::{Job, JobRegistry, JobState},
    video::VideoOpener,
};

/// Filename used when a client supplies nothing usable.
const FALLBACK_FILENAME: &str = "video.mp4";

/// Returned by [`UploadManager::init`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadTicket {
    /// Identifier of the new job.
    pub job_id: String,
    /// Size every chunk but the last must have.
    pub chunk_size: u64,
}

/// Acknowledgement of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkAck {
    /// Distinct chunks received so far.
    pub received_chunks: u64,
    /// Chunks the upload consists of.
    pub total_chunks: u64,
    /// Whether the upload is complete.
    pub complete: bool,
}

/// Upload progress for pollers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadStatus {
    /// Current job state.
    pub state: JobState,
    /// Distinct chunks received so far.
    pub received_chunks: u64,
    /// Chunks the upload consists of.
    pub total_chunks: u64,
    /// Bytes received so far.
    pub uploaded_bytes: u64,
    /// Declared upload size.
    pub total_size: u64,
    /// Received share in percent.
    pub progress: f64,
}

#[derive(Debug, Default)]
struct Received {
    chunks: HashSet<u64>,
    bytes: u64,
    finalizing: bool,
}

/// Geometry and bookkeeping of one chunked upload.
#[derive(Debug)]
pub struct UploadSession {
    filename: String,
    total_size: u64,
    chunk_size: u64,
    total_chunks: u64,
    video_path: PathBuf,
    received: Mutex<Received>,
}

impl UploadSession {
    /// Create the backing file, pre-sized to `total_size`.
    pub(crate) fn create(directory: &Path, filename: &str, total_size: u64, chunk_size: u64) -> Result<Self, FramePickError> {
        fs::create_dir_all(directory)?;
        let filename = sanitize_filename(filename);
        let video_path = directory.join(&filename);
        let file = File::create(&video_path)?;
        file.set_len(total_size)?;

        Ok(Self {
            filename,
            total_size,
            chunk_size,
            total_chunks: total_size.div_ceil(chunk_size),
            video_path,
            received: Mutex::new(Received::default()),
        })
    }

    /// Sanitized filename of the upload.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Declared upload size.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Chunks the upload consists of.
    pub fn total_chunks(&self) -> u64 {
        self.total_chunks
    }

    /// Where the upload is reassembled.
    pub fn video_path(&self) -> &Path {
        &self.video_path
    }

    fn expected_len(&self, chunk_index: u64) -> u64 {
        if chunk_index + 1 == self.total_chunks {
            self.total_size - chunk_index * self.chunk_size
        } else {
            self.chunk_size
        }
    }

    fn ack(&self, received: &Received) -> ChunkAck {
        let received_chunks = received.chunks.len() as u64;
        ChunkAck {
            received_chunks,
            total_chunks: self.total_chunks,
            complete: received_chunks == self.total_chunks,
        }
    }

    /// Current acknowledgement without writing anything.
    pub(crate) fn current_ack(&self) -> ChunkAck {
        self.ack(&self.received.lock())
    }

    /// Write one chunk. Returns the acknowledgement and whether this caller
    /// must finalize the upload.
    pub(crate) fn write_chunk(
        &self,
        chunk_index: u64,
        total_chunks: u64,
        data: &[u8],
    ) -> Result<(ChunkAck, bool), FramePickError> {
        if chunk_index >= total_chunks.min(self.total_chunks) {
            return Err(FramePickError::ChunkOutOfRange {
                chunk_index,
                total_chunks: self.total_chunks,
            });
        }
        if total_chunks != self.total_chunks {
            return Err(FramePickError::InvalidChunk {
                chunk_index,
                reason: format!("upload has {} chunks, request declared {total_chunks}", self.total_chunks),
            });
        }
        let expected = self.expected_len(chunk_index);
        if data.len() as u64 != expected {
            return Err(FramePickError::InvalidChunk {
                chunk_index,
                reason: format!("expected {expected} bytes, got {}", data.len()),
            });
        }

        let mut file = OpenOptions::new().write(true).open(&self.video_path)?;
        file.seek(SeekFrom::Start(chunk_index * self.chunk_size))?;
        file.write_all(data)?;
        file.flush()?;
        log::debug!(
            "Wrote chunk {}/{} ({} bytes) to {}",
            chunk_index + 1,
            self.total_chunks,
            data.len(),
            self.video_path.display()
        );

        let mut received = self.received.lock();
        if received.chunks.insert(chunk_index) {
            received.bytes += data.len() as u64;
        }
        let ack = self.ack(&received);
        let finalize = ack.complete && !received.finalizing;
        if finalize {
            received.finalizing = true;
        }
        Ok((ack, finalize))
    }

    /// Hand back the right to finalize after a failed attempt.
    fn release_finalize(&self) {
        self.received.lock().finalizing = false;
    }

    fn status(&self, state: JobState) -> UploadStatus {
        let received = self.received.lock();
        let ack = self.ack(&received);
        UploadStatus {
            state,
            received_chunks: ack.received_chunks,
            total_chunks: ack.total_chunks,
            uploaded_bytes: received.bytes,
            total_size: self.total_size,
            progress: received.bytes as f64 / self.total_size.max(1) as f64 * 100.0,
        }
    }
}

/// Reduce a client-supplied filename to a safe final path component.
pub fn sanitize_filename(filename: &str) -> String {
    let last = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Owns upload geometry and turns finished uploads into ready jobs.
pub struct UploadManager {
    upload_root: PathBuf,
    chunk_size: u64,
    max_upload_size: u64,
    opener: Arc<dyn VideoOpener>,
}

impl UploadManager {
    /// A manager reassembling uploads under `upload_root`.
    pub fn new(upload_root: PathBuf, chunk_size: u64, max_upload_size: u64, opener: Arc<dyn VideoOpener>) -> Self {
        Self {
            upload_root,
            chunk_size: chunk_size.max(1),
            max_upload_size,
            opener,
        }
    }

    pub(crate) fn set_opener(&mut self, opener: Arc<dyn VideoOpener>) {
        self.opener = opener;
    }

    /// Start an upload of `total_size` bytes.
    ///
    /// # Errors
    ///
    /// [`FramePickError::InvalidSize`] if `total_size` is not positive or
    /// exceeds the maximum; I/O errors creating the backing file.
    pub fn init(&self, registry: &JobRegistry, filename: &str, total_size: i64) -> Result<UploadTicket, FramePickError> {
        let invalid = || FramePickError::InvalidSize {
            size: total_size,
            max: self.max_upload_size,
        };
        let size = u64::try_from(total_size).map_err(|_| invalid())?;
        if size == 0 || size > self.max_upload_size {
            return Err(invalid());
        }

        let job_id = JobRegistry::new_id();
        let directory = self.upload_root.join(&job_id);
        let session = UploadSession::create(&directory, filename, size, self.chunk_size)?;
        log::info!(
            "Created upload job {} for '{}' ({} bytes, {} chunks)",
            job_id,
            session.filename(),
            size,
            session.total_chunks()
        );
        registry.insert(Job::uploading(job_id.clone(), session, directory));

        Ok(UploadTicket {
            job_id,
            chunk_size: self.chunk_size,
        })
    }

    /// Store one chunk and finalize the upload if it was the last one.
    ///
    /// Chunks for a job that has already left `uploading` are acknowledged
    /// without being written.
    ///
    /// # Errors
    ///
    /// [`FramePickError::UnknownJob`], [`FramePickError::ChunkOutOfRange`],
    /// [`FramePickError::InvalidChunk`], I/O errors, and
    /// [`FramePickError::UnreadableVideo`] when this chunk completed an
    /// upload that turns out not to be a video.
    pub fn put_chunk(
        &self,
        registry: &JobRegistry,
        job_id: &str,
        chunk_index: u64,
        total_chunks: u64,
        data: &[u8],
    ) -> Result<ChunkAck, FramePickError> {
        let job = registry.get(job_id)?;
        let session = job
            .upload()
            .ok_or_else(|| FramePickError::InvalidChunk {
                chunk_index,
                reason: format!("job {job_id} was not created by an upload"),
            })?;

        if job.state() != JobState::Uploading {
            log::debug!("Ignoring chunk {chunk_index} for job {job_id}: upload already finalized");
            return Ok(session.current_ack());
        }

        let (ack, finalize) = session.write_chunk(chunk_index, total_chunks, data)?;
        if finalize {
            if let Err(error) = self.finalize(&job, session) {
                if job.state() == JobState::Uploading {
                    log::warn!("Finalizing upload {job_id} failed, the next chunk retries: {error}");
                    session.release_finalize();
                }
                return Err(error);
            }
        }
        Ok(ack)
    }

    /// Open the reassembled file and move the job to `ready`.
    ///
    /// I/O failures leave the job in `uploading`; a file that is not a video
    /// moves it to `error`.
    fn finalize(&self, job: &Job, session: &UploadSession) -> Result<(), FramePickError> {
        let path = session.video_path().to_path_buf();
        File::open(&path)?.sync_all()?;

        match self.opener.open(&path) {
            Ok(video) => {
                log::info!("Upload {} finalized: {}", job.id(), path.display());
                job.mark_ready(path, video);
                Ok(())
            }
            Err(error @ FramePickError::IoError(_)) => Err(error),
            Err(error) => {
                log::warn!("Upload {} is not a readable video: {}", job.id(), error);
                job.mark_failed(error.to_string());
                Err(match error {
                    FramePickError::UnreadableVideo { .. } => error,
                    other => FramePickError::UnreadableVideo {
                        path,
                        reason: other.to_string(),
                    },
                })
            }
        }
    }

    /// Upload progress of `job_id`, or `None` for jobs registered from a
    /// local file.
    ///
    /// # Errors
    ///
    /// [`FramePickError::UnknownJob`].
    pub fn status(&self, registry: &JobRegistry, job_id: &str) -> Result<Option<UploadStatus>, FramePickError> {
        let job = registry.get(job_id)?;
        Ok(job.upload().map(|session| session.status(job.state())))
    }
}
