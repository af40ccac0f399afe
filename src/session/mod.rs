mod file;
mod memory;
mod redis;

pub use file::FileSessionStore;
pub use memory::MemorySessionStore;
pub use self::redis::RedisSessionStore;

use async_trait::async_trait;
use log::info;
use std::error::Error;
use std::sync::Arc;
use thiserror::Error as ThisError;
use crate::cli::Args;
use crate::models::chat::UserProfile;

#[derive(Debug, ThisError)]
pub enum StorageError {
    #[error("session I/O error while {operation}: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("stored session is malformed: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("failed to encode session: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("redis session error: {0}")]
    Redis(#[from] ::redis::RedisError),
}

/// Durable home of the current user profile, one record under a fixed key.
///
/// Implementations never surface failures: `load` degrades to `None` and
/// `save`/`clear` log what went wrong.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Option<UserProfile>;

    async fn save(&self, profile: &UserProfile);

    async fn clear(&self);
}

pub(crate) fn decode_profile(raw: &str) -> Result<UserProfile, StorageError> {
    serde_json::from_str(raw).map_err(StorageError::Malformed)
}

pub(crate) fn encode_profile(profile: &UserProfile) -> Result<String, StorageError> {
    serde_json::to_string(profile).map_err(StorageError::Encode)
}

pub fn create_session_store(
    args: &Args
) -> Result<Arc<dyn SessionStore>, Box<dyn Error + Send + Sync>> {
    match args.session_type.to_lowercase().as_str() {
        "file" => Ok(Arc::new(FileSessionStore::new(&args.session_path))),
        "redis" => {
            let store = RedisSessionStore::new(&args.session_redis_url, &args.session_key)?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(MemorySessionStore::new())),
        _ =>
            Err(
                Box::new(
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Unsupported session store type: {}", args.session_type)
                    )
                )
            ),
    }
}

pub fn initialize_session_store(
    args: &Args
) -> Result<Arc<dyn SessionStore>, Box<dyn Error + Send + Sync>> {
    match args.session_type.to_lowercase().as_str() {
        "file" => info!("Session will be stored in: file at {}", args.session_path),
        "redis" =>
            info!(
                "Session will be stored in: redis at {} (key '{}')",
                args.session_redis_url,
                args.session_key
            ),
        other => info!("Session will be stored in: {}", other),
    }
    create_session_store(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn unknown_store_type_is_rejected() {
        let args = Args::try_parse_from(["rishi-sage", "--session-type", "sqlite"]).unwrap();
        let err = create_session_store(&args).err().expect("sqlite is not a store");
        assert!(err.to_string().contains("sqlite"));
    }

    #[test]
    fn malformed_profile_is_reported() {
        assert!(matches!(decode_profile("{\"name\": 3}"), Err(StorageError::Malformed(_))));
    }
}
