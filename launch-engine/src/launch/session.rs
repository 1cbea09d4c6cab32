//! Process-local launch sessions between prepare and submit

use serde::Serialize;
use solana_sdk::{message::Message, pubkey::Pubkey};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use crate::core::{Deadline, LaunchError, LaunchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LaunchPhase {
    Preparing,
    AwaitingUserSignature,
    Submitting,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct LaunchSession {
    pub mint: Pubkey,
    pub caller: Pubkey,
    /// The exact message handed to the caller for signing
    pub message: Message,
    pub expires: Deadline,
    pub phase: LaunchPhase,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Pubkey, LaunchSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Pubkey, LaunchSession>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, session: LaunchSession) {
        self.lock().insert(session.mint, session);
    }

    pub fn get(&self, mint: &Pubkey) -> Option<LaunchSession> {
        self.lock().get(mint).cloned()
    }

    pub fn phase(&self, mint: &Pubkey) -> Option<LaunchPhase> {
        self.lock().get(mint).map(|s| s.phase)
    }

    /// Move a locally prepared session into `Submitting`.
    ///
    /// Returns false when this process holds no session for `mint`. Fails when
    /// a submission is already in flight or the message differs from the
    /// prepared one.
    pub fn begin_submit(&self, mint: &Pubkey, caller: &Pubkey, message: &Message) -> LaunchResult<bool> {
        let mut sessions = self.lock();
        let Some(session) = sessions.get_mut(mint) else {
            return Ok(false);
        };

        if session.phase == LaunchPhase::Submitting {
            return Err(LaunchError::InvalidTransaction(format!(
                "submission for {} already in flight",
                mint
            )));
        }
        if session.caller != *caller || session.message != *message {
            return Err(LaunchError::InvalidTransaction(
                "transaction does not match the prepared launch".into(),
            ));
        }
        session.phase = LaunchPhase::Submitting;
        Ok(true)
    }

    /// Record the final phase and drop the session
    pub fn finish(&self, mint: &Pubkey, phase: LaunchPhase) {
        if let Some(session) = self.lock().remove(mint) {
            debug!("Launch session {} finished: {:?} -> {:?}", mint, session.phase, phase);
        }
    }

    /// Drop sessions whose signing window has passed and that are not mid-submission
    pub fn purge_expired(&self) -> usize {
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, s| s.phase == LaunchPhase::Submitting || !s.expires.is_expired());
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
