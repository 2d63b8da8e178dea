//! Compress stage: stream a dump through gzip and retire the raw dump

use crate::model::{ArchiveArtifact, DumpArtifact};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum CompressFailure {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("dump was truncated while compressing: expected {expected} bytes, read {read}")]
    Truncated { expected: u64, read: u64 },

    #[error("compressed archive {path:?} is empty")]
    EmptyArchive { path: PathBuf },
}

impl CompressFailure {
    fn io(context: impl Into<String>) -> impl FnOnce(io::Error) -> Self {
        let context = context.into();
        move |source| CompressFailure::Io { context, source }
    }
}

/// Turns a dump artifact into an archive artifact
pub trait CompressStage: Send + Sync {
    fn compress(&self, artifact: &DumpArtifact, output_path: &Path) -> Result<ArchiveArtifact, CompressFailure>;
}

/// Output file removed on drop unless committed
struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove partial archive {:?}: {}", self.path, e);
            }
        } else {
            debug!("Discarded partial archive: {:?}", self.path);
        }
    }
}

/// Reader wrapper counting the bytes that pass through it
struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

/// Streaming gzip compressor
#[derive(Debug, Clone)]
pub struct GzipCompressStage {
    level: u32,
    buffer_size: usize,
}

impl Default for GzipCompressStage {
    fn default() -> Self {
        Self::new(6, 64 * 1024)
    }
}

impl GzipCompressStage {
    pub fn new(level: u32, buffer_size: usize) -> Self {
        Self {
            level: level.min(9),
            buffer_size: buffer_size.max(1024),
        }
    }

    /// Write the gzip stream for `source` into `output_path`, returning bytes read
    fn write_archive(&self, source: &Path, output_path: &Path) -> Result<u64, CompressFailure> {
        let input = File::open(source)
            .map_err(CompressFailure::io(format!("Failed to open dump {:?}", source)))?;
        let mut reader = CountingReader {
            inner: BufReader::with_capacity(self.buffer_size, input),
            count: 0,
        };

        let output = File::create(output_path)
            .map_err(CompressFailure::io(format!("Failed to create archive {:?}", output_path)))?;
        let writer = BufWriter::with_capacity(self.buffer_size, output);
        let mut encoder = GzEncoder::new(writer, Compression::new(self.level));

        io::copy(&mut reader, &mut encoder)
            .map_err(CompressFailure::io(format!("Failed to compress {:?}", source)))?;

        let mut writer = encoder
            .finish()
            .map_err(CompressFailure::io("Failed to finish gzip stream"))?;
        writer
            .flush()
            .map_err(CompressFailure::io("Failed to flush archive"))?;
        let file = writer
            .into_inner()
            .map_err(|e| CompressFailure::Io {
                context: "Failed to flush archive".to_string(),
                source: e.into_error(),
            })?;
        file.sync_all()
            .map_err(CompressFailure::io("Failed to sync archive to disk"))?;

        Ok(reader.count)
    }
}

impl CompressStage for GzipCompressStage {
    fn compress(&self, artifact: &DumpArtifact, output_path: &Path) -> Result<ArchiveArtifact, CompressFailure> {
        info!(
            "Compressing dump for '{}': {:?} -> {:?}",
            artifact.target.id, artifact.path, output_path
        );

        let expected = fs::metadata(&artifact.path)
            .map_err(CompressFailure::io(format!("Failed to stat dump {:?}", artifact.path)))?
            .len();

        let partial = PartialFile::new(output_path);
        let read = self.write_archive(&artifact.path, output_path)?;

        if read != expected {
            return Err(CompressFailure::Truncated { expected, read });
        }

        let archive_size = fs::metadata(output_path)
            .map_err(CompressFailure::io(format!("Failed to stat archive {:?}", output_path)))?
            .len();
        if archive_size == 0 {
            return Err(CompressFailure::EmptyArchive {
                path: output_path.to_path_buf(),
            });
        }

        partial.commit();

        // The archive is complete; only now is the raw dump retired
        if let Err(e) = fs::remove_file(&artifact.path) {
            warn!("Failed to remove dump {:?} after compression: {}", artifact.path, e);
        }

        info!(
            "Compressed '{}': {} -> {} bytes",
            artifact.target.id, expected, archive_size
        );

        Ok(ArchiveArtifact {
            path: output_path.to_path_buf(),
            source: artifact.clone(),
        })
    }
}
