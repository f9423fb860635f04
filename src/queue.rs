//! Offline queue implementations.
//!
//! Both serialize every mutation behind an async mutex, and removal is by
//! id, so entries appended while a sync is in flight survive it.

use std::collections::HashSet;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::{RankingError, Result};
use crate::repository::{is_local_id, EventQueueRepository, QueuedEvent};

fn check_local(entry: &QueuedEvent) -> Result<()> {
    match entry.local_id() {
        Some(id) if is_local_id(id) => Ok(()),
        Some(id) => Err(RankingError::Queue(format!(
            "queued event id {id} lacks the local prefix"
        ))),
        None => Err(RankingError::Queue("queued events need a local id".to_string())),
    }
}

#[derive(Debug, Default)]
pub struct MemoryEventQueue {
    entries: Mutex<Vec<QueuedEvent>>,
}

impl MemoryEventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl EventQueueRepository for MemoryEventQueue {
    async fn append(&self, entry: QueuedEvent) -> Result<()> {
        check_local(&entry)?;
        self.entries.lock().await.push(entry);
        Ok(())
    }

    async fn drain_pending(&self) -> Result<Vec<QueuedEvent>> {
        Ok(self.entries.lock().await.clone())
    }

    async fn remove(&self, ids: &[String]) -> Result<usize> {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|entry| !entry.local_id().is_some_and(|id| ids.contains(id)));
        Ok(before - entries.len())
    }

    async fn record_failure(&self, ids: &[String]) -> Result<()> {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut entries = self.entries.lock().await;
        for entry in entries.iter_mut() {
            if entry.local_id().is_some_and(|id| ids.contains(id)) {
                entry.attempts += 1;
            }
        }
        Ok(())
    }
}

/// JSON-lines file queue. Appends go to the end of the file; removals
/// rewrite it through a temporary file and an atomic rename.
#[derive(Debug)]
pub struct FileEventQueue {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileEventQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sidecar receiving lines that could not be parsed when the queue file
    /// is rewritten.
    pub fn corrupt_path(&self) -> PathBuf {
        self.path.with_extension("corrupt")
    }

    async fn read_file(&self) -> Result<QueueFile> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(QueueFile::default())
            }
            Err(err) => return Err(err.into()),
        };

        let mut file = QueueFile::default();
        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<QueuedEvent>(line) {
                Ok(entry) => file.entries.push(entry),
                Err(err) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = line_no + 1,
                        %err,
                        "skipping unreadable queue line"
                    );
                    file.unreadable.push(line.to_string());
                }
            }
        }
        Ok(file)
    }

    /// Rewrites the queue with `entries`. Unreadable lines are moved to
    /// [`Self::corrupt_path`] first so a rewrite never destroys them.
    async fn write_file(&self, file: &QueueFile) -> Result<()> {
        if !file.unreadable.is_empty() {
            let mut quarantine = String::new();
            for line in &file.unreadable {
                quarantine.push_str(line);
                quarantine.push('\n');
            }
            let mut sidecar = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.corrupt_path())
                .await?;
            sidecar.write_all(quarantine.as_bytes()).await?;
            sidecar.flush().await?;
            tracing::warn!(
                path = %self.corrupt_path().display(),
                lines = file.unreadable.len(),
                "moved unreadable queue lines aside"
            );
        }

        let mut body = String::new();
        for entry in &file.entries {
            body.push_str(&serde_json::to_string(entry)?);
            body.push('\n');
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct QueueFile {
    entries: Vec<QueuedEvent>,
    unreadable: Vec<String>,
}

#[async_trait]
impl EventQueueRepository for FileEventQueue {
    async fn append(&self, entry: QueuedEvent) -> Result<()> {
        check_local(&entry)?;
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await?;

        // A torn last line must not swallow the new entry.
        if file.metadata().await?.len() > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1)).await?;
            file.read_exact(&mut last).await?;
            if last[0] != b'\n' {
                line.insert(0, '\n');
            }
        }

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn drain_pending(&self) -> Result<Vec<QueuedEvent>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_file().await?.entries)
    }

    async fn remove(&self, ids: &[String]) -> Result<usize> {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let _guard = self.lock.lock().await;
        let mut file = self.read_file().await?;
        let before = file.entries.len();
        file.entries
            .retain(|entry| !entry.local_id().is_some_and(|id| ids.contains(id)));
        let removed = before - file.entries.len();
        if removed > 0 {
            self.write_file(&file).await?;
        }
        Ok(removed)
    }

    async fn record_failure(&self, ids: &[String]) -> Result<()> {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let _guard = self.lock.lock().await;
        let mut file = self.read_file().await?;
        for entry in file.entries.iter_mut() {
            if entry.local_id().is_some_and(|id| ids.contains(id)) {
                entry.attempts += 1;
            }
        }
        self.write_file(&file).await
    }
}
