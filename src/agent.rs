use crate::access::{ AccessError, AccessGate };
use crate::config::persona::PersonaConfig;
use crate::llm::ProviderError;
use crate::llm::chat::SageClient;
use crate::models::chat::{ Message, Role, SageReply, UserProfile };
use crate::session::SessionStore;

use chrono::Utc;
use log::{ debug, error, info, warn };
use std::future::Future;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Sending,
}

/// A submission that has been admitted and is waiting for the sage.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    text: String,
    user_name: String,
    epoch: u64,
}

impl PendingTurn {
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Assistant text shown for a structured reply: the prose, then the boost.
pub fn compose_reply_text(reply: &SageReply) -> String {
    format!("{}\n\n✨ **{}**", reply.text, reply.dopamine_boost)
}

/// Owns the session: the active profile, the message log and the state of
/// the one turn that may be in flight.
pub struct SageAgent {
    sage: Arc<dyn SageClient>,
    sessions: Arc<dyn SessionStore>,
    gate: AccessGate,
    persona: Arc<PersonaConfig>,
    profile: Option<UserProfile>,
    messages: Vec<Message>,
    state: TurnState,
    next_id: u64,
    // Bumped on logout so replies to turns of a closed session are dropped.
    epoch: u64,
}

impl SageAgent {
    pub async fn start(
        sage: Arc<dyn SageClient>,
        sessions: Arc<dyn SessionStore>,
        gate: AccessGate,
        persona: Arc<PersonaConfig>
    ) -> Self {
        let profile = match sessions.load().await {
            Some(profile) if gate.admits(&profile) => {
                info!("Restored session for '{}'", profile.name);
                Some(profile)
            }
            Some(profile) => {
                warn!(
                    "Saved session for '{}' does not match the current access code, discarding it",
                    profile.name
                );
                sessions.clear().await;
                None
            }
            None => None,
        };

        Self {
            sage,
            sessions,
            gate,
            persona,
            profile,
            messages: Vec::new(),
            state: TurnState::Idle,
            next_id: 0,
            epoch: 0,
        }
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn is_sending(&self) -> bool {
        self.state == TurnState::Sending
    }

    /// Changes on every logout; work tagged with an older value belongs to a
    /// closed session.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn persona(&self) -> &PersonaConfig {
        &self.persona
    }

    pub fn sage(&self) -> Arc<dyn SageClient> {
        Arc::clone(&self.sage)
    }

    /// Checks the access code, persists the new profile and seeds the log
    /// with the sage's greeting. Nothing changes on failure.
    pub async fn register(&mut self, name: &str, token: &str) -> Result<&UserProfile, AccessError> {
        if self.profile.is_some() {
            return Err(AccessError::AlreadyRegistered);
        }
        let profile = self.gate.register(name, token)?;
        self.sessions.save(&profile).await;

        let greeting = self.persona.greeting_for(&profile.name);
        self.messages.clear();
        self.push(Role::Assistant, greeting, None);
        Ok(&*self.profile.insert(profile))
    }

    /// Admission control for a new turn. Returns `None` and leaves the log
    /// untouched for blank text, a missing profile or a turn already in flight.
    pub fn begin_turn(&mut self, text: &str) -> Option<PendingTurn> {
        if text.trim().is_empty() {
            return None;
        }
        let user_name = match &self.profile {
            Some(profile) => profile.name.clone(),
            None => {
                debug!("Ignoring submission without an active profile");
                return None;
            }
        };
        if self.state == TurnState::Sending {
            warn!("Rejected submission while a reply is still pending");
            return None;
        }

        self.push(Role::User, text.to_string(), None);
        self.state = TurnState::Sending;
        Some(PendingTurn {
            text: text.to_string(),
            user_name,
            epoch: self.epoch,
        })
    }

    /// The provider call for `turn`, detached from `self` so it can run while
    /// the caller keeps handling input.
    pub fn reply_future(
        &self,
        turn: &PendingTurn
    ) -> impl Future<Output = Result<SageReply, ProviderError>> + Send + 'static {
        let sage = Arc::clone(&self.sage);
        let text = turn.text.clone();
        let user_name = turn.user_name.clone();
        async move { sage.generate_reply(&text, &user_name).await }
    }

    /// Appends exactly one assistant message for `turn`: the reply, or the
    /// fallback when the provider failed. Turns from before a logout append
    /// nothing but still release the sending state.
    pub fn complete_turn(
        &mut self,
        turn: PendingTurn,
        result: Result<SageReply, ProviderError>
    ) -> Option<&Message> {
        self.state = TurnState::Idle;
        if turn.epoch != self.epoch {
            info!("Discarding reply to a turn from a closed session");
            return None;
        }

        let (text, plan) = match result {
            Ok(reply) => {
                let text = compose_reply_text(&reply);
                (text, Some(reply.plan).filter(|plan| !plan.is_empty()))
            }
            Err(e) => {
                error!("Sage reply failed: {}", e);
                (self.persona.fallback_reply.clone(), None)
            }
        };
        Some(self.push(Role::Assistant, text, plan))
    }

    /// One full turn: admit, ask the sage, append the answer.
    pub async fn submit(&mut self, text: &str) -> Option<&Message> {
        let turn = self.begin_turn(text)?;
        let result = self.reply_future(&turn).await;
        self.complete_turn(turn, result)
    }

    pub async fn logout(&mut self) {
        if let Some(profile) = self.profile.take() {
            info!("Logging out '{}'", profile.name);
        }
        self.sessions.clear().await;
        self.messages.clear();
        // A pending turn keeps the state at Sending until complete_turn sees it.
        self.epoch += 1;
    }

    fn push(&mut self, role: Role, text: String, plan: Option<Vec<String>>) -> &Message {
        self.next_id += 1;
        self.messages.push(Message {
            id: format!("{:010}", self.next_id),
            role,
            text,
            timestamp: Utc::now().timestamp_millis(),
            plan,
        });
        &self.messages[self.messages.len() - 1]
    }
}
