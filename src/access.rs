use log::{ info, warn };
use thiserror::Error;

use crate::models::chat::UserProfile;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("access code does not match")]
    InvalidToken,
    #[error("name must not be empty")]
    EmptyName,
    #[error("a user is already registered in this session")]
    AlreadyRegistered,
}

/// Shared-code gate in front of the conversation. Not an authentication system.
#[derive(Clone)]
pub struct AccessGate {
    secret: String,
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate").finish_non_exhaustive()
    }
}

impl AccessGate {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    pub fn register(&self, name: &str, submitted_token: &str) -> Result<UserProfile, AccessError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AccessError::EmptyName);
        }
        if submitted_token != self.secret {
            warn!("Rejected registration attempt for '{}': invalid access code", name);
            return Err(AccessError::InvalidToken);
        }
        info!("Registered user '{}'", name);
        Ok(UserProfile {
            name: name.to_string(),
            token: submitted_token.to_string(),
            is_registered: true,
        })
    }

    /// Whether a restored profile is still valid against the current code.
    pub fn admits(&self, profile: &UserProfile) -> bool {
        profile.is_registered && profile.token == self.secret && !profile.name.trim().is_empty()
    }
}
