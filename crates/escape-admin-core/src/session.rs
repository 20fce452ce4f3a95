//! Persistent auth session.
//!
//! The session is two entries in a small key-value store: the bearer token
//! under [`TOKEN_KEY`] and the serialized [`UserProfile`] under [`USER_KEY`].
//! [`SessionStore`] writes and erases both together, so a restored session is
//! either complete or absent.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AdminError, Result};
use crate::models::UserProfile;

/// Storage key of the bearer token.
pub const TOKEN_KEY: &str = "authToken";

/// Storage key of the serialized user profile.
pub const USER_KEY: &str = "currentUser";

/// A signed-in teacher: bearer token plus profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque bearer token issued by the server.
    pub token: String,
    /// Profile returned at login.
    pub user: UserProfile,
}

/// String key-value persistence behind the session store.
pub trait Storage {
    /// Reads the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Removes `key` if present.
    fn remove(&mut self, key: &str) -> Result<()>;

    /// Stores several entries. Backends that can write them in one step
    /// should override this.
    fn set_all(&mut self, entries: &[(&str, &str)]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Removes several keys, attempting every key before reporting the
    /// first failure.
    fn remove_all(&mut self, keys: &[&str]) -> Result<()> {
        let mut first_error = None;
        for key in keys {
            if let Err(e) = self.remove(key) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// In-process storage; nothing survives the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: BTreeMap<String, String>,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// JSON object file on disk, rewritten on every change.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Uses the JSON file at `path`; it is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_contents(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(None),
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AdminError::session_storage(&self.path, e.to_string())),
        }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        let Some(contents) = self.read_contents()? else {
            return Ok(BTreeMap::new());
        };
        serde_json::from_str(&contents)
            .map_err(|e| AdminError::session_storage(&self.path, format!("malformed JSON: {e}")))
    }

    /// Entries to rewrite, plus whether the file must be rewritten regardless.
    /// A malformed file counts as empty so that writes can replace it.
    fn read_for_write(&self) -> Result<(BTreeMap<String, String>, bool)> {
        let Some(contents) = self.read_contents()? else {
            return Ok((BTreeMap::new(), false));
        };
        match serde_json::from_str(&contents) {
            Ok(entries) => Ok((entries, false)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Session file is malformed; overwriting it");
                Ok((BTreeMap::new(), true))
            }
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| AdminError::session_storage(&self.path, e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, json)
            .map_err(|e| AdminError::session_storage(&self.path, e.to_string()))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.set_all(&[(key, value)])
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.remove_all(&[key])
    }

    fn set_all(&mut self, entries: &[(&str, &str)]) -> Result<()> {
        let (mut stored, _) = self.read_for_write()?;
        for (key, value) in entries {
            stored.insert((*key).to_string(), (*value).to_string());
        }
        self.write_all(&stored)
    }

    fn remove_all(&mut self, keys: &[&str]) -> Result<()> {
        let (mut stored, malformed) = self.read_for_write()?;
        let mut changed = malformed;
        for key in keys {
            changed |= stored.remove(*key).is_some();
        }
        if changed {
            self.write_all(&stored)?;
        }
        Ok(())
    }
}

/// Saves, restores and clears the session as a unit.
#[derive(Debug, Clone)]
pub struct SessionStore<S> {
    storage: S,
}

impl<S: Storage> SessionStore<S> {
    /// Wraps a storage backend.
    pub const fn new(storage: S) -> Self {
        Self { storage }
    }

    /// The underlying storage.
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Reads the persisted session without contacting the server.
    ///
    /// Returns `None` unless both entries are present and the profile parses.
    /// A half-written or unreadable session is cleared so that the token and
    /// user never outlive each other.
    pub fn restore(&mut self) -> Result<Option<Session>> {
        let entries = self
            .storage
            .get(TOKEN_KEY)
            .and_then(|token| Ok((token, self.storage.get(USER_KEY)?)));
        let (token, user) = match entries {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Stored session is unreadable; clearing it");
                self.clear()?;
                return Ok(None);
            }
        };

        match (token, user) {
            (Some(token), Some(user_json)) if !token.is_empty() => {
                match serde_json::from_str::<UserProfile>(&user_json) {
                    Ok(user) => {
                        debug!(user_id = user.id, username = %user.username, "Restored session");
                        Ok(Some(Session { token, user }))
                    }
                    Err(e) => {
                        warn!(error = %e, "Stored user profile is unreadable; clearing session");
                        self.clear()?;
                        Ok(None)
                    }
                }
            }
            (None, None) => Ok(None),
            _ => {
                warn!("Found incomplete session; clearing it");
                self.clear()?;
                Ok(None)
            }
        }
    }

    /// Persists token and profile together.
    pub fn save(&mut self, session: &Session) -> Result<()> {
        let user_json = serde_json::to_string(&session.user)?;
        if let Err(e) = self
            .storage
            .set_all(&[(TOKEN_KEY, session.token.as_str()), (USER_KEY, user_json.as_str())])
        {
            // Don't leave a token behind without its user.
            if let Err(rollback) = self.storage.remove(TOKEN_KEY) {
                warn!(error = %rollback, "Failed to roll back partially saved session");
            }
            return Err(e);
        }
        debug!(user_id = session.user.id, "Saved session");
        Ok(())
    }

    /// Erases token and profile.
    pub fn clear(&mut self) -> Result<()> {
        self.storage.remove_all(&[TOKEN_KEY, USER_KEY])?;
        debug!("Cleared session");
        Ok(())
    }
}
