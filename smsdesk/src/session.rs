//! Authentication state shared by every API call.
//!
//! Replaces a global auth store: create one [`Session`] per application,
//! hand it to the client, and subscribe to [`SessionEvent`]s to learn when
//! the user has to sign in again.
use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::info;

const EVENTS_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    /// The user asked to sign out.
    Logout,
    /// The backend rejected the token; the UI should go to the login page.
    Unauthorized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    SignedOut { reason: SignOutReason },
}

#[derive(Debug)]
pub struct Session {
    token: RwLock<Option<String>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENTS_CAPACITY);
        Self {
            token: RwLock::new(None),
            events,
        }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::new();
        *session.token.write().unwrap_or_else(PoisonError::into_inner) =
            Some(token.into());
        session
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) =
            Some(token.into());
        let _ = self.events.send(SessionEvent::SignedIn);
    }

    /// Forget the token. Emits `SignedOut` only if there was one.
    pub fn clear(&self, reason: SignOutReason) {
        let previous = self
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            info!(?reason, "session cleared");
            let _ = self.events.send(SessionEvent::SignedOut { reason });
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
