//! Token persistence trait abstraction.
//!
//! Provides a trait-based abstraction over where the session credential is
//! persisted between runs, enabling dependency injection and mocking in
//! tests. The production implementation is [`crate::auth::CredentialsFile`].

/// Trait for persisting the session credential across restarts.
///
/// The token store writes through on every change so a restarted client
/// resumes its previous session. Implementations must tolerate missing or
/// corrupt storage by returning `None` from [`load`](Self::load); the store
/// treats persistence failures as non-fatal.
pub trait TokenPersistence: Send + Sync {
    /// Load the persisted token, if any.
    fn load(&self) -> Option<String>;

    /// Persist the token.
    ///
    /// # Returns
    /// `true` on success, `false` if the write failed
    fn save(&self, token: &str) -> bool;

    /// Remove the persisted token.
    ///
    /// # Returns
    /// `true` on success (including when nothing was stored)
    fn clear(&self) -> bool;
}
