//! Append-only log file with rotation.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, error, info};

use super::format::ARCHIVE_STAMP_FORMAT;
use super::{LoggerError, Result};

/// An open log file. Every appended line is flushed before returning.
pub struct LogFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl LogFile {
    /// Open `path` for append, creating the file if needed.
    ///
    /// Parent directories are not created.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| LoggerError::Open {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), "Log file opened");
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line and flush it.
    pub async fn append(&mut self, line: &str) -> Result<()> {
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(LoggerError::Write)?;
        self.writer.write_all(b"\n").await.map_err(LoggerError::Write)?;
        self.writer.flush().await.map_err(LoggerError::Write)
    }

    /// Flush and close the file.
    pub async fn close(mut self) {
        if let Err(e) = self.writer.shutdown().await {
            error!(path = %self.path.display(), error = %e, "Failed to close log file");
        }
    }

    /// Close the file, move it to a timestamped archive name and reopen the
    /// original path.
    ///
    /// Returns the archive path, or `None` if the rename failed, in which
    /// case appending continues on the original file. Failing to reopen is
    /// an error.
    pub async fn rotate(self, now: &DateTime<Local>) -> Result<(Self, Option<PathBuf>)> {
        let path = self.path.clone();
        self.close().await;

        let archived = match archive_to(&path, now).await {
            Ok(archive) => {
                info!(from = %path.display(), to = %archive.display(), "Log file archived");
                Some(archive)
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to archive log file");
                None
            }
        };

        let reopened = Self::open(&path).await?;
        Ok((reopened, archived))
    }
}

async fn archive_to(path: &Path, now: &DateTime<Local>) -> std::io::Result<PathBuf> {
    let mut attempt = 0;
    let mut archive = archive_path(path, now, attempt);
    while tokio::fs::try_exists(&archive).await? {
        attempt += 1;
        archive = archive_path(path, now, attempt);
    }

    tokio::fs::rename(path, &archive).await?;
    Ok(archive)
}

/// `<stem>_<stamp>[-<attempt>]<.ext>` next to `path`.
pub fn archive_path(path: &Path, now: &DateTime<Local>, attempt: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let suffix = if attempt == 0 {
        String::new()
    } else {
        format!("-{}", attempt)
    };

    path.with_file_name(format!(
        "{}_{}{}{}",
        stem,
        now.format(ARCHIVE_STAMP_FORMAT),
        suffix,
        ext
    ))
}
