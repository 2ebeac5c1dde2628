//! Authenticated identity and its explicit persistence.
//!
//! The session façade never reads identity from ambient state. Callers load
//! it once (for example at startup with [`IdentityStore::load`]), pass it to
//! [`ChatSession::activate`](crate::session::ChatSession::activate), and save
//! it back when it changes.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::protocol::UserId;

/// The signed-in user a room session acts as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Server-assigned user id.
    pub id: UserId,
    /// Display name shown next to sent messages.
    pub username: String,
    /// Email returned by login, when the account has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// `true` for throwaway guest accounts.
    #[serde(default)]
    pub guest: bool,
}

impl Identity {
    /// Create a registered (non-guest) identity.
    pub fn new(id: impl Into<UserId>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            email: None,
            guest: false,
        }
    }

    /// Create a guest identity.
    pub fn guest(id: impl Into<UserId>, username: impl Into<String>) -> Self {
        Self {
            guest: true,
            ..Self::new(id, username)
        }
    }

    /// Attach the account email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// JSON file holding the last signed-in identity.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    /// Store backed by the file at `path`. Nothing is touched until a method
    /// is called.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored identity. A missing file means nobody is signed in.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Io`](crate::ChatError::Io) for unreadable files and
    /// [`ChatError::Serialization`](crate::ChatError::Serialization) for
    /// corrupted contents.
    pub fn load(&self) -> Result<Option<Identity>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist `identity`, replacing whatever was stored.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Io`](crate::ChatError::Io) if the file cannot be
    /// written.
    pub fn save(&self, identity: &Identity) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string(identity)?;
        std::fs::write(&self.path, raw)?;
        debug!(user = %identity.id, path = %self.path.display(), "identity saved");
        Ok(())
    }

    /// Forget the stored identity (sign-out). Clearing an empty store is fine.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Io`](crate::ChatError::Io) if the file exists but
    /// cannot be removed.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist `Some` or clear on `None`, mirroring a sign-in/sign-out change.
    ///
    /// # Errors
    ///
    /// See [`save`](Self::save) and [`clear`](Self::clear).
    pub fn sync(&self, identity: Option<&Identity>) -> Result<()> {
        match identity {
            Some(identity) => self.save(identity),
            None => self.clear(),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::ChatError;

    fn store_in(dir: &tempfile::TempDir) -> IdentityStore {
        IdentityStore::new(dir.path().join("nested").join("chat_user.json"))
    }

    #[test]
    fn load_from_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store_in(&dir).load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_returns_identity() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let alice = Identity::new("u1", "Alice").with_email("alice@example.com");

        store.save(&alice).unwrap();
        assert_eq!(store.load().unwrap(), Some(alice));
    }

    #[test]
    fn sync_none_clears_and_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.sync(Some(&Identity::guest("g1", "guest-42"))).unwrap();
        assert!(store.load().unwrap().unwrap().guest);

        store.sync(None).unwrap();
        store.sync(None).unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn corrupted_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{not json").unwrap();

        assert!(matches!(store.load(), Err(ChatError::Serialization(_))));
    }

    #[test]
    fn guest_flag_defaults_to_false_on_old_files() {
        let parsed: Identity = serde_json::from_str(r#"{"id":"u1","username":"Alice"}"#).unwrap();
        assert!(!parsed.guest);
        assert!(parsed.email.is_none());
    }
}
