//! In-memory token persistence for testing.
//!
//! Provides a persistence backend that holds the token in memory and records
//! every operation, so tests can assert write-through ordering without
//! touching the file system.

use std::sync::{Arc, Mutex};

use crate::traits::TokenPersistence;

/// One recorded persistence operation, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOp {
    /// The store asked for the persisted token.
    Load,
    /// The store wrote a token through.
    Save(String),
    /// The store removed the persisted token.
    Clear,
}

/// In-memory token persistence for testing.
///
/// # Example
///
/// ```ignore
/// use deskwire::adapters::mock::{MemoryTokenFile, PersistOp};
/// use deskwire::auth::TokenStore;
/// use std::sync::Arc;
///
/// let file = Arc::new(MemoryTokenFile::new());
/// let store = TokenStore::with_persistence(file.clone());
///
/// store.set("tok");
/// assert_eq!(file.stored(), Some("tok".to_string()));
/// assert_eq!(file.ops()[0], PersistOp::Load);
/// ```
#[derive(Clone, Default)]
pub struct MemoryTokenFile {
    /// Stored token
    token: Arc<Mutex<Option<String>>>,
    /// Recorded operations
    ops: Arc<Mutex<Vec<PersistOp>>>,
    /// Whether save should fail
    save_should_fail: Arc<Mutex<bool>>,
}

impl MemoryTokenFile {
    /// Create an empty persistence backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that already holds a token.
    pub fn with_token(token: &str) -> Self {
        let file = Self::default();
        *file.token.lock().unwrap() = Some(token.to_string());
        file
    }

    /// Configure whether save should fail.
    pub fn set_fail_saves(&self, should_fail: bool) {
        *self.save_should_fail.lock().unwrap() = should_fail;
    }

    /// The currently stored token (for assertions).
    pub fn stored(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    /// Every operation performed against this backend, in order.
    pub fn ops(&self) -> Vec<PersistOp> {
        self.ops.lock().unwrap().clone()
    }
}

impl TokenPersistence for MemoryTokenFile {
    fn load(&self) -> Option<String> {
        self.ops.lock().unwrap().push(PersistOp::Load);
        self.token.lock().unwrap().clone()
    }

    fn save(&self, token: &str) -> bool {
        self.ops
            .lock()
            .unwrap()
            .push(PersistOp::Save(token.to_string()));
        if *self.save_should_fail.lock().unwrap() {
            return false;
        }
        *self.token.lock().unwrap() = Some(token.to_string());
        true
    }

    fn clear(&self) -> bool {
        self.ops.lock().unwrap().push(PersistOp::Clear);
        *self.token.lock().unwrap() = None;
        true
    }
}
