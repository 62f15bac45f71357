//! Credential storage for the Deskwire client.
//!
//! This module persists the session bearer token to
//! `~/.deskwire/credentials.json` so a restarted client resumes its session
//! without a fresh login.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use crate::traits::TokenPersistence;

/// The credentials directory name.
const CREDENTIALS_DIR: &str = ".deskwire";

/// The credentials file name.
const CREDENTIALS_FILE: &str = "credentials.json";

/// On-disk credential payload.
///
/// NOTE: Only the bearer token is stored locally. The refresh credential is
/// an httpOnly cookie the server manages; it never touches this file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
struct StoredCredential {
    /// Bearer token for API authentication, absent when signed out.
    token: Option<String>,
}

/// File-backed credential storage at a fixed location.
#[derive(Debug)]
pub struct CredentialsFile {
    /// Path to the credentials file.
    path: PathBuf,
}

impl CredentialsFile {
    /// Create a store at the default location under the home directory.
    ///
    /// Returns `None` if the home directory cannot be determined.
    pub fn new() -> Option<Self> {
        let home = dirs::home_dir()?;
        let path = home.join(CREDENTIALS_DIR).join(CREDENTIALS_FILE);
        Some(Self { path })
    }

    /// Create a store at an explicit path.
    pub fn at_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Get the path to the credentials file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Load the stored token.
    ///
    /// Returns `None` if the file doesn't exist, can't be read, or doesn't
    /// parse; a broken credentials file reads as signed out.
    pub fn load(&self) -> Option<String> {
        if !self.path.exists() {
            return None;
        }

        let file = File::open(&self.path).ok()?;
        let reader = BufReader::new(file);
        let stored: StoredCredential = serde_json::from_reader(reader).ok()?;
        stored.token
    }

    /// Save a token to the credentials file.
    ///
    /// Creates the parent directory if it doesn't exist.
    /// Returns `true` if successful, `false` otherwise.
    pub fn save(&self, token: &str) -> bool {
        // Ensure the parent directory exists
        if let Some(parent) = self.path.parent() {
            if !parent.exists() && fs::create_dir_all(parent).is_err() {
                return false;
            }
        }

        let file = match File::create(&self.path) {
            Ok(f) => f,
            Err(_) => return false,
        };

        let mut writer = BufWriter::new(file);
        let stored = StoredCredential {
            token: Some(token.to_string()),
        };
        if serde_json::to_writer_pretty(&mut writer, &stored).is_err() {
            return false;
        }

        writer.flush().is_ok()
    }

    /// Remove the credentials file if it exists.
    ///
    /// Returns `true` if successful or the file didn't exist, `false` otherwise.
    pub fn clear(&self) -> bool {
        if !self.path.exists() {
            return true;
        }

        fs::remove_file(&self.path).is_ok()
    }
}

impl TokenPersistence for CredentialsFile {
    fn load(&self) -> Option<String> {
        CredentialsFile::load(self)
    }

    fn save(&self, token: &str) -> bool {
        CredentialsFile::save(self, token)
    }

    fn clear(&self) -> bool {
        CredentialsFile::clear(self)
    }
}
