//! Persistence of the active conversation id for reload-resume.
//!
//! Only the id is stored; turns are refetched from the backend.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ClientError;

pub trait SessionStore: Send + Sync {
    /// Persisted conversation id, if any. Unreadable state counts as none.
    fn load(&self) -> Option<String>;

    /// # Errors
    ///
    /// Returns an error when the id cannot be written.
    fn save(&self, conversation_id: &str) -> Result<(), ClientError>;

    /// # Errors
    ///
    /// Returns an error when existing state cannot be removed.
    fn clear(&self) -> Result<(), ClientError>;
}

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    id: Mutex<Option<String>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_id(conversation_id: impl Into<String>) -> Self {
        Self { id: Mutex::new(Some(conversation_id.into())) }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<String> {
        self.id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, conversation_id: &str) -> Result<(), ClientError> {
        *self.id.lock().unwrap_or_else(PoisonError::into_inner) = Some(conversation_id.to_owned());
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        *self.id.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct SessionFile {
    conversation_id: String,
}

/// JSON file holding `{"conversation_id": "..."}`.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<String> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return None,
            Err(error) => {
                warn!(error = %error, path = %self.path.display(), "session: read failed");
                return None;
            }
        };
        match serde_json::from_str::<SessionFile>(&raw) {
            Ok(file) if !file.conversation_id.is_empty() => Some(file.conversation_id),
            Ok(_) => None,
            Err(error) => {
                warn!(error = %error, path = %self.path.display(), "session: ignoring corrupt file");
                None
            }
        }
    }

    fn save(&self, conversation_id: &str) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let body = serde_json::to_string(&SessionFile { conversation_id: conversation_id.to_owned() })?;
        std::fs::write(&self.path, body)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}
