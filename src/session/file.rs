use async_trait::async_trait;
use log::{ debug, warn };
use std::io::ErrorKind;
use std::path::{ Path, PathBuf };
use tokio::fs;

use super::{ decode_profile, encode_profile, SessionStore, StorageError };
use crate::models::chat::UserProfile;

/// Keeps the profile as a single JSON document on disk.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn try_load(&self) -> Result<Option<UserProfile>, StorageError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(None);
            }
            Err(source) => {
                return Err(StorageError::Io { operation: "reading session file", source });
            }
        };
        decode_profile(&raw).map(Some)
    }

    async fn try_save(&self, profile: &UserProfile) -> Result<(), StorageError> {
        let json = encode_profile(profile)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs
                ::create_dir_all(parent).await
                .map_err(|source| StorageError::Io { operation: "creating session directory", source })?;
        }
        fs
            ::write(&self.path, json).await
            .map_err(|source| StorageError::Io { operation: "writing session file", source })
    }

    async fn try_clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { operation: "removing session file", source }),
        }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Option<UserProfile> {
        match self.try_load().await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Ignoring saved session at {}: {}", self.path.display(), e);
                None
            }
        }
    }

    async fn save(&self, profile: &UserProfile) {
        match self.try_save(profile).await {
            Ok(()) => debug!("Session saved to {}", self.path.display()),
            Err(e) => warn!("Failed to save session to {}: {}", self.path.display(), e),
        }
    }

    async fn clear(&self) {
        if let Err(e) = self.try_clear().await {
            warn!("Failed to clear session at {}: {}", self.path.display(), e);
        }
    }
}
