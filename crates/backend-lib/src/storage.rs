// ============================
// crates/backend-lib/src/storage.rs
// ============================
//! Storage abstraction with flat-file implementation.
//!
//! Only metadata of shared files is stored here; the bytes are uploaded
//! elsewhere and referenced by URL.
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use huddle_common::FileRecord;
use tokio::{fs as tokio_fs, sync::Mutex};

use crate::error::AppError;
use crate::validation::validate_meeting_id;

const CURRENT_DIR: &str = "current-meetings";
const FINISHED_DIR: &str = "finished-meetings";
const FILES_INDEX: &str = "files.json";

/// Trait for storage backends
#[async_trait]
pub trait Storage: Send + Sync {
    /// List the files shared in a meeting, oldest first
    async fn list_files(&self, meeting_id: &str) -> Result<Vec<FileRecord>, AppError>;

    /// Append a file record
    async fn add_file(&self, record: &FileRecord) -> Result<(), AppError>;

    /// Remove a file record, returning it if it existed
    async fn remove_file(
        &self,
        meeting_id: &str,
        file_id: &str,
    ) -> Result<Option<FileRecord>, AppError>;

    /// Archive a meeting (move from current to finished)
    async fn archive_meeting(&self, meeting_id: &str) -> Result<(), AppError>;
}

/// Flat-file implementation of the Storage trait
#[derive(Clone)]
pub struct FlatFileStorage {
    root: PathBuf,
    // serializes read-modify-write of the index files
    write_lock: Arc<Mutex<()>>,
}

impl FlatFileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(CURRENT_DIR))?;
        fs::create_dir_all(root.join(FINISHED_DIR))?;
        Ok(Self {
            root,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn meeting_dir(&self, meeting_id: &str) -> Result<PathBuf, AppError> {
        let meeting_id = validate_meeting_id(meeting_id)?;
        Ok(self.root.join(CURRENT_DIR).join(meeting_id))
    }

    async fn read_index(&self, path: &Path) -> Result<Vec<FileRecord>, AppError> {
        if !tokio_fs::try_exists(path).await? {
            return Ok(Vec::new());
        }
        let content = tokio_fs::read_to_string(path).await?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    async fn write_index(&self, path: &Path, records: &[FileRecord]) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            tokio_fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(records)?;
        // write-then-rename so readers never see a torn file
        let tmp = path.with_extension("json.tmp");
        tokio_fs::write(&tmp, json).await?;
        tokio_fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for FlatFileStorage {
    async fn list_files(&self, meeting_id: &str) -> Result<Vec<FileRecord>, AppError> {
        let path = self.meeting_dir(meeting_id)?.join(FILES_INDEX);
        self.read_index(&path).await
    }

    async fn add_file(&self, record: &FileRecord) -> Result<(), AppError> {
        let path = self.meeting_dir(&record.meeting_id)?.join(FILES_INDEX);
        let _guard = self.write_lock.lock().await;

        let mut records = self.read_index(&path).await?;
        records.push(record.clone());
        self.write_index(&path, &records).await
    }

    async fn remove_file(
        &self,
        meeting_id: &str,
        file_id: &str,
    ) -> Result<Option<FileRecord>, AppError> {
        let path = self.meeting_dir(meeting_id)?.join(FILES_INDEX);
        let _guard = self.write_lock.lock().await;

        let mut records = self.read_index(&path).await?;
        let Some(index) = records.iter().position(|r| r.id == file_id) else {
            return Ok(None);
        };
        let removed = records.remove(index);
        self.write_index(&path, &records).await?;
        Ok(Some(removed))
    }

    async fn archive_meeting(&self, meeting_id: &str) -> Result<(), AppError> {
        let src = self.meeting_dir(meeting_id)?;
        if !tokio_fs::try_exists(&src).await? {
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;
        let dst = self.root.join(FINISHED_DIR).join(meeting_id);
        tokio_fs::rename(src, dst).await?;
        Ok(())
    }
}
