//! Session checkpoint storage
//!
//! [`FileCheckpointStore`] keeps one JSON document per session and replaces it
//! atomically: the new state is written to a sibling `.tmp` file, flushed, then
//! renamed over the old one. [`MemoryCheckpointStore`] is the in-process
//! variant used by tests and one-shot runs.

use crate::types::{AppError, Result};
use crate::workflows::session::Session;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load a session. `None` means the id was never stored.
    async fn get(&self, session_id: &str) -> Result<Option<Session>>;

    /// Store the current state of a session, replacing any previous checkpoint.
    async fn put(&self, session: &Session) -> Result<()>;

    /// Ids of every stored session.
    async fn list(&self) -> Result<Vec<String>>;
}

// ============= In-Memory Store =============

#[derive(Default)]
pub struct MemoryCheckpointStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().get(session_id).cloned())
    }

    async fn put(&self, session: &Session) -> Result<()> {
        self.sessions
            .write()
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

// ============= File Store =============

pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Session ids become file names, so only `[A-Za-z0-9_-]` is accepted.
    fn path_for(&self, session_id: &str) -> Result<PathBuf> {
        let valid = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(AppError::InvalidInput(format!(
                "invalid session id: {:?}",
                session_id
            )));
        }
        Ok(self.dir.join(format!("{}.json", session_id)))
    }
}

fn checkpoint_err(action: &str, path: &Path, e: impl std::fmt::Display) -> AppError {
    AppError::Checkpoint(format!("failed to {} {}: {}", action, path.display(), e))
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        let path = self.path_for(session_id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(checkpoint_err("read", &path, e)),
        };
        let session = serde_json::from_str(&content).map_err(|e| checkpoint_err("parse", &path, e))?;
        Ok(Some(session))
    }

    async fn put(&self, session: &Session) -> Result<()> {
        let path = self.path_for(&session.id)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| checkpoint_err("create", &self.dir, e))?;

        let body = serde_json::to_vec_pretty(session)
            .map_err(|e| checkpoint_err("serialize", &path, e))?;

        let tmp = path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| checkpoint_err("create", &tmp, e))?;
        file.write_all(&body)
            .await
            .map_err(|e| checkpoint_err("write", &tmp, e))?;
        file.sync_all()
            .await
            .map_err(|e| checkpoint_err("sync", &tmp, e))?;
        drop(file);

        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| checkpoint_err("replace", &path, e))?;

        tracing::debug!(session_id = %session.id, stage = %session.stage, "Checkpoint written");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(checkpoint_err("list", &self.dir, e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| checkpoint_err("list", &self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
