//! Shared bearer-token store.
//!
//! Both the API client and the realtime channel hold a [`TokenStore`] handle;
//! it is the only mutable state they share. Holders always read the credential
//! at the moment of use, because a refresh can replace it while other requests
//! are in flight.

use std::sync::{Arc, RwLock};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::traits::TokenPersistence;

/// Session lifecycle phase, observable via [`TokenStore::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No credential stored.
    SignedOut,
    /// A credential is present.
    Active,
    /// The credential was dropped because a refresh failed; the user has to
    /// authenticate again.
    Expired,
}

/// Process-wide holder of the session bearer token.
///
/// Cloning is cheap and clones share state. At most one credential is live at
/// a time; absence means unauthenticated. When built with persistence the
/// store writes through on every change, so a restarted client resumes its
/// session.
#[derive(Clone)]
pub struct TokenStore {
    bearer: Arc<RwLock<Option<String>>>,
    status: Arc<watch::Sender<SessionStatus>>,
    persist: Option<Arc<dyn TokenPersistence>>,
}

impl TokenStore {
    /// Create a store with no persistence. Starts signed out.
    pub fn in_memory() -> Self {
        let (status, _) = watch::channel(SessionStatus::SignedOut);
        Self {
            bearer: Arc::new(RwLock::new(None)),
            status: Arc::new(status),
            persist: None,
        }
    }

    /// Create a store backed by `persistence`, loading any token it holds.
    pub fn with_persistence(persistence: Arc<dyn TokenPersistence>) -> Self {
        let loaded = persistence.load();
        let initial = if loaded.is_some() {
            debug!("resumed session from persisted credential");
            SessionStatus::Active
        } else {
            SessionStatus::SignedOut
        };
        let (status, _) = watch::channel(initial);
        Self {
            bearer: Arc::new(RwLock::new(loaded)),
            status: Arc::new(status),
            persist: Some(persistence),
        }
    }

    /// The current credential, read at the moment of use.
    pub fn bearer(&self) -> Option<String> {
        self.bearer.read().unwrap().clone()
    }

    /// Whether a credential is present.
    pub fn is_authenticated(&self) -> bool {
        self.bearer.read().unwrap().is_some()
    }

    /// Store a new credential (login or refresh success).
    pub fn set(&self, token: impl Into<String>) {
        let token = token.into();
        *self.bearer.write().unwrap() = Some(token.clone());
        if let Some(persist) = &self.persist {
            if !persist.save(&token) {
                warn!("failed to persist session credential");
            }
        }
        let _ = self.status.send(SessionStatus::Active);
    }

    /// Drop the credential on purpose (logout).
    pub fn clear(&self) {
        self.wipe(SessionStatus::SignedOut);
    }

    /// Drop the credential after a failed refresh.
    ///
    /// Distinct from [`clear`](Self::clear) so subscribers can tell a
    /// deliberate sign-out from a session that died underneath them.
    pub fn expire(&self) {
        self.wipe(SessionStatus::Expired);
    }

    fn wipe(&self, status: SessionStatus) {
        *self.bearer.write().unwrap() = None;
        if let Some(persist) = &self.persist {
            if !persist.clear() {
                warn!("failed to clear persisted session credential");
            }
        }
        let _ = self.status.send(status);
    }

    /// Subscribe to session lifecycle changes.
    ///
    /// The receiver starts at the current phase and notifies on every
    /// transition, including logout and expiry.
    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Current session phase without subscribing.
    pub fn current_status(&self) -> SessionStatus {
        *self.status.borrow()
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
