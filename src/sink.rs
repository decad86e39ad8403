use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::LoggerError;
use crate::record::NotificationRecord;

/// Append-only log file. Every record is flushed and synced before
/// `append` returns, so an interrupt never leaves half a line behind.
pub struct LogSink {
    path: PathBuf,
    file: File,
}

impl LogSink {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LoggerError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| LoggerError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&mut self, record: &NotificationRecord) -> Result<(), LoggerError> {
        let line = record.to_line();
        self.write(line.as_bytes()).await.map_err(|source| LoggerError::Io {
            path: self.path.clone(),
            source,
        })
    }

    async fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.file.write_all(bytes).await?;
        self.file.flush().await?;
        self.file.sync_data().await
    }

    pub async fn close(mut self) -> Result<(), LoggerError> {
        self.file.flush().await.map_err(|source| LoggerError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir().join(format!("sink-{}.csv", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_append_never_truncates() {
        let path = scratch_path();
        tokio::fs::write(&path, "earlier line\n").await.unwrap();

        let mut sink = LogSink::open(&path).await.unwrap();
        let record = NotificationRecord::decode(b"512", Local::now()).unwrap();
        sink.append(&record).await.unwrap();
        sink.close().await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "earlier line");
        assert!(lines[1].ends_with(" 512"));

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_open_missing_directory_is_io_error() {
        let path = std::env::temp_dir()
            .join(uuid::Uuid::new_v4().to_string())
            .join("out.csv");
        match LogSink::open(&path).await {
            Err(LoggerError::Io { path: reported, .. }) => assert_eq!(reported, path),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("opened a file in a missing directory"),
        }
    }
}
