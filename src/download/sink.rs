//! Destinations for downloaded bytes.
//!
//! A session writes into exactly one [`Sink`], chosen before the first
//! request: a [`StreamingSink`] obtained from a [`SaveAsProvider`], or an
//! in-memory [`BufferedSink`] whose [`MediaBlob`] goes to a [`SaveAction`]
//! once all parts have arrived.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::client::BodyStream;
use super::error::{DownloadError, SaveAsError};
use super::filename::{resolve_unique_path, target_path};

/// A destination that accepts bytes incrementally.
#[async_trait]
pub trait StreamingSink: Send {
    /// Writes one chunk; the engine awaits it before issuing the next request.
    async fn write(&mut self, chunk: Bytes) -> Result<(), DownloadError>;

    /// Finalizes the destination under `file_name`, which may differ from the
    /// suggested name once the served content type is known. Returns where the
    /// data landed.
    async fn close(&mut self, file_name: &str) -> Result<PathBuf, DownloadError>;

    /// Discards everything written so far. Never fails; cleanup errors are logged.
    async fn abort(&mut self);
}

/// Capability that may yield a streaming destination for a suggested name.
#[async_trait]
pub trait SaveAsProvider: Send + Sync {
    /// Whether the capability exists in this environment at all.
    fn is_available(&self) -> bool;

    /// Requests a destination, distinguishing cancellation from failure.
    async fn request(&self, suggested_name: &str)
    -> Result<Box<dyn StreamingSink>, SaveAsError>;
}

/// Fire-and-forget save of a finalized in-memory blob.
pub trait SaveAction: Send + Sync {
    /// Dispatches the save. Only dispatch failures are reported; the write
    /// itself is not awaited by the caller.
    fn save(&self, blob: MediaBlob, file_name: &str) -> Result<(), DownloadError>;
}

/// Concatenated download held in memory, typed by its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBlob {
    /// MIME type, e.g. `video/mp4`.
    pub mime: String,
    /// The whole resource.
    pub bytes: Bytes,
}

impl MediaBlob {
    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true for an empty blob.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// In-memory accumulator of parts in fetch (and therefore offset) order.
#[derive(Debug, Default)]
pub struct BufferedSink {
    parts: Vec<Bytes>,
}

impl BufferedSink {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one part.
    pub fn append(&mut self, part: Bytes) {
        self.parts.push(part);
    }

    /// Parts received so far.
    #[must_use]
    pub fn parts(&self) -> &[Bytes] {
        &self.parts
    }

    /// Total bytes accumulated.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.iter().map(Bytes::len).sum()
    }

    /// Returns true when nothing has been accumulated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concatenates the parts into one blob.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::NoData`] when there are no parts, the first
    /// part is empty, or the concatenation is empty.
    pub fn finalize(self, mime: &str) -> Result<MediaBlob, DownloadError> {
        if self.parts.first().is_none_or(Bytes::is_empty) {
            return Err(DownloadError::NoData);
        }
        let mut joined = BytesMut::with_capacity(self.len());
        for part in self.parts {
            joined.extend_from_slice(&part);
        }
        if joined.is_empty() {
            return Err(DownloadError::NoData);
        }
        Ok(MediaBlob {
            mime: mime.to_string(),
            bytes: joined.freeze(),
        })
    }
}

/// Which sink variant a session used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// Written incrementally to a save-as destination.
    Streaming,
    /// Accumulated in memory and saved at the end.
    Buffered,
}

/// The destination selected for one session; never switched mid-session.
pub enum Sink {
    /// Streaming destination.
    Streaming(Box<dyn StreamingSink>),
    /// In-memory accumulation.
    Buffered(BufferedSink),
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Streaming(_) => f.write_str("Sink::Streaming"),
            Self::Buffered(buffered) => f
                .debug_struct("Sink::Buffered")
                .field("parts", &buffered.parts.len())
                .finish(),
        }
    }
}

impl Sink {
    /// Variant of this sink.
    #[must_use]
    pub fn kind(&self) -> SinkKind {
        match self {
            Self::Streaming(_) => SinkKind::Streaming,
            Self::Buffered(_) => SinkKind::Buffered,
        }
    }

    /// Consumes one response body into the sink, returning its length.
    ///
    /// Streaming sinks receive each chunk as it arrives, each write awaited;
    /// buffered sinks receive the body as one part.
    ///
    /// # Errors
    ///
    /// Propagates body read errors and streaming write errors.
    pub async fn accept(&mut self, mut body: BodyStream) -> Result<u64, DownloadError> {
        let mut received: u64 = 0;
        match self {
            Self::Streaming(sink) => {
                while let Some(chunk) = body.next().await {
                    let chunk = chunk?;
                    if chunk.is_empty() {
                        continue;
                    }
                    received += chunk.len() as u64;
                    sink.write(chunk).await?;
                }
            }
            Self::Buffered(buffered) => {
                let mut part = BytesMut::new();
                while let Some(chunk) = body.next().await {
                    let chunk = chunk?;
                    received += chunk.len() as u64;
                    part.extend_from_slice(&chunk);
                }
                buffered.append(part.freeze());
            }
        }
        Ok(received)
    }

    /// Drops the sink after a failed session, discarding partial output.
    pub async fn discard(self) {
        if let Self::Streaming(mut streaming) = self {
            streaming.abort().await;
        }
    }
}

/// Streaming sink backed by a local file.
///
/// Bytes go to a `.part` file next to the destination; `close` renames it to
/// the final name, `abort` deletes it.
#[derive(Debug)]
pub struct FileSink {
    dir: PathBuf,
    part_path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    /// Wraps an already opened part file inside `dir`.
    #[must_use]
    pub fn new(dir: PathBuf, part_path: PathBuf, file: File) -> Self {
        Self {
            dir,
            part_path,
            writer: Some(BufWriter::new(file)),
        }
    }

    fn closed_error(&self) -> DownloadError {
        DownloadError::io(
            self.part_path.clone(),
            std::io::Error::other("streaming destination already closed"),
        )
    }
}

#[async_trait]
impl StreamingSink for FileSink {
    async fn write(&mut self, chunk: Bytes) -> Result<(), DownloadError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(self.closed_error());
        };
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(self.part_path.clone(), e))
    }

    async fn close(&mut self, file_name: &str) -> Result<PathBuf, DownloadError> {
        let Some(mut writer) = self.writer.take() else {
            return Err(self.closed_error());
        };
        writer
            .flush()
            .await
            .map_err(|e| DownloadError::io(self.part_path.clone(), e))?;
        writer
            .get_mut()
            .sync_all()
            .await
            .map_err(|e| DownloadError::io(self.part_path.clone(), e))?;
        drop(writer);

        let path = resolve_unique_path(&self.dir, file_name);
        tokio::fs::rename(&self.part_path, &path)
            .await
            .map_err(|e| DownloadError::io(path.clone(), e))?;
        debug!(path = %path.display(), "streaming destination closed");
        Ok(path)
    }

    async fn abort(&mut self) {
        drop(self.writer.take());
        match tokio::fs::remove_file(&self.part_path).await {
            Ok(()) => debug!(path = %self.part_path.display(), "discarded partial download"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => error!(
                path = %self.part_path.display(),
                error = %e,
                "cannot remove partial download"
            ),
        }
    }
}

/// Save-as capability writing directly into an output directory.
///
/// An existing file at the suggested path is never overwritten; that is
/// reported as [`SaveAsError::Cancelled`], so the session falls back to the
/// buffered path and saves under a unique name instead. The same applies
/// when another session is already writing the matching `.part` file.
#[derive(Debug, Clone)]
pub struct DirectorySaveAs {
    dir: PathBuf,
    enabled: bool,
}

impl DirectorySaveAs {
    /// Creates an enabled provider for `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            enabled: true,
        }
    }

    /// Enables or disables the capability.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[async_trait]
impl SaveAsProvider for DirectorySaveAs {
    fn is_available(&self) -> bool {
        self.enabled
    }

    async fn request(
        &self,
        suggested_name: &str,
    ) -> Result<Box<dyn StreamingSink>, SaveAsError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| SaveAsError::failed(self.dir.clone(), e))?;
        let path = target_path(&self.dir, suggested_name);
        match tokio::fs::try_exists(&path).await {
            Ok(false) => {}
            Ok(true) => {
                info!(path = %path.display(), "destination exists, declining save-as");
                return Err(SaveAsError::Cancelled);
            }
            Err(e) => return Err(SaveAsError::failed(path, e)),
        }
        let part_path = part_path_for(&path);
        let file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&part_path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                info!(path = %part_path.display(), "destination in use, declining save-as");
                return Err(SaveAsError::Cancelled);
            }
            Err(e) => return Err(SaveAsError::failed(part_path, e)),
        };
        debug!(path = %part_path.display(), "opened streaming destination");
        Ok(Box::new(FileSink::new(self.dir.clone(), part_path, file)))
    }
}

fn part_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// Saves finalized blobs into an output directory on background tasks.
#[derive(Debug)]
pub struct DirectorySaver {
    dir: PathBuf,
    pending: Mutex<Vec<JoinHandle<bool>>>,
}

impl DirectorySaver {
    /// Creates a saver for `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Waits for every dispatched save to finish and returns how many failed.
    pub async fn flush(&self) -> usize {
        let handles: Vec<JoinHandle<bool>> = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            pending.drain(..).collect()
        };
        let mut failed = 0;
        for handle in handles {
            match handle.await {
                Ok(true) => {}
                Ok(false) => failed += 1,
                Err(e) => {
                    error!(error = %e, "save task panicked");
                    failed += 1;
                }
            }
        }
        failed
    }
}

impl SaveAction for DirectorySaver {
    fn save(&self, blob: MediaBlob, file_name: &str) -> Result<(), DownloadError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DownloadError::save(file_name, e.to_string()))?;
        let dir = self.dir.clone();
        let file_name = file_name.to_string();
        let handle = runtime.spawn(async move {
            if let Err(e) = tokio::fs::create_dir_all(&dir).await {
                error!(dir = %dir.display(), error = %e, "cannot create output directory");
                return false;
            }
            let path = resolve_unique_path(&dir, &file_name);
            match tokio::fs::write(&path, &blob.bytes).await {
                Ok(()) => {
                    info!(
                        path = %path.display(),
                        bytes = blob.len(),
                        mime = %blob.mime,
                        "saved download"
                    );
                    true
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "save failed");
                    false
                }
            }
        });
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
        Ok(())
    }
}
