use async_trait::async_trait;
use log::{ debug, warn };
use redis::{ AsyncCommands, Client };

use super::{ decode_profile, encode_profile, SessionStore, StorageError };
use crate::models::chat::UserProfile;

pub struct RedisSessionStore {
    client: Client,
    key: String,
}

impl RedisSessionStore {
    pub fn new(url: &str, key: &str) -> Result<Self, StorageError> {
        Ok(Self {
            client: Client::open(url)?,
            key: key.to_string(),
        })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    async fn try_load(&self) -> Result<Option<UserProfile>, StorageError> {
        let mut conn = self.get_connection().await?;
        let raw: Option<String> = conn.get(&self.key).await?;
        raw.as_deref().map(decode_profile).transpose()
    }

    async fn try_save(&self, profile: &UserProfile) -> Result<(), StorageError> {
        let json = encode_profile(profile)?;
        let mut conn = self.get_connection().await?;
        conn.set::<_, _, ()>(&self.key, json).await?;
        Ok(())
    }

    async fn try_clear(&self) -> Result<(), StorageError> {
        let mut conn = self.get_connection().await?;
        let _: i64 = conn.del(&self.key).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self) -> Option<UserProfile> {
        match self.try_load().await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Ignoring saved session under '{}': {}", self.key, e);
                None
            }
        }
    }

    async fn save(&self, profile: &UserProfile) {
        match self.try_save(profile).await {
            Ok(()) => debug!("Session saved under '{}'", self.key),
            Err(e) => warn!("Failed to save session under '{}': {}", self.key, e),
        }
    }

    async fn clear(&self) {
        if let Err(e) = self.try_clear().await {
            warn!("Failed to clear session under '{}': {}", self.key, e);
        }
    }
}
