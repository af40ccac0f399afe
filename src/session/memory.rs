use async_trait::async_trait;
use log::warn;
use std::sync::Mutex;

use super::SessionStore;
use crate::models::chat::UserProfile;

/// Process-local store; nothing survives a restart.
#[derive(Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<UserProfile>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(profile: UserProfile) -> Self {
        Self { slot: Mutex::new(Some(profile)) }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Option<UserProfile> {
        match self.slot.lock() {
            Ok(slot) => slot.clone(),
            Err(e) => {
                warn!("Failed to load session: {}", e);
                None
            }
        }
    }

    async fn save(&self, profile: &UserProfile) {
        match self.slot.lock() {
            Ok(mut slot) => {
                *slot = Some(profile.clone());
            }
            Err(e) => warn!("Failed to save session for '{}': {}", profile.name, e),
        }
    }

    async fn clear(&self) {
        match self.slot.lock() {
            Ok(mut slot) => {
                *slot = None;
            }
            Err(e) => warn!("Failed to clear session: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_load_clear() {
        let store = MemorySessionStore::new();
        let profile = UserProfile {
            name: "Ana".to_string(),
            token: "code".to_string(),
            is_registered: true,
        };

        assert_eq!(store.load().await, None);
        store.save(&profile).await;
        assert_eq!(store.load().await, Some(profile));
        store.clear().await;
        assert_eq!(store.load().await, None);
    }

    #[tokio::test]
    async fn poisoned_slot_degrades_to_no_session() {
        let store = std::sync::Arc::new(MemorySessionStore::new());
        let poisoner = std::sync::Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.slot.lock().unwrap();
            panic!("poison the slot");
        }).join();
        assert!(store.slot.is_poisoned());

        let profile = UserProfile {
            name: "Ana".to_string(),
            token: "code".to_string(),
            is_registered: true,
        };
        store.save(&profile).await;
        store.clear().await;
        assert_eq!(store.load().await, None);
    }
}
