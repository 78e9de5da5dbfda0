//! Persisted handle for rejoining a game after a restart.
//!
//! Holds only what a `rejoinGame` request needs. The file is disposable: it
//! is written when a session starts and removed when the session ends.

use std::path::{Path, PathBuf};

use chess::PieceColor;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const RESUME_FILE_NAME: &str = "resume_session.json";

#[derive(Error, Debug)]
pub enum ResumeStoreError {
    #[error("Resume file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Resume file is malformed: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeHandle {
    pub session_id: String,
    pub user_id: String,
    pub assigned_color: Option<PieceColor>,
    /// Seconds since the Unix epoch.
    pub saved_at: u64,
}

impl ResumeHandle {
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        assigned_color: Option<PieceColor>,
    ) -> Self {
        let saved_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            assigned_color,
            saved_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResumeStore {
    dir: PathBuf,
}

impl ResumeStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(RESUME_FILE_NAME)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(&self, handle: &ResumeHandle) -> Result<PathBuf, ResumeStoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path();
        let json = serde_json::to_string_pretty(handle)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// The saved handle, if one exists.
    pub fn load(&self) -> Result<Option<ResumeHandle>, ResumeStoreError> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// The saved handle only if it belongs to `user_id`.
    pub fn load_for(&self, user_id: &str) -> Result<Option<ResumeHandle>, ResumeStoreError> {
        Ok(self.load()?.filter(|h| h.user_id == user_id))
    }

    pub fn clear(&self) -> Result<(), ResumeStoreError> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}
