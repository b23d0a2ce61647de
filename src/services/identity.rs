//! Actor identity resolution.
//!
//! DESIGN
//! ======
//! Every event a session produces is tagged with the local actor's id. An
//! authenticated user's id is used verbatim. Otherwise an anonymous id is
//! read from a [`LocalStore`], or generated and written there first, so the
//! same visitor keeps one id across restarts until they sign in.
//!
//! Colors are a pure function of the id, so every client paints the same
//! actor the same way without coordinating.
//!
//! ERROR HANDLING
//! ==============
//! Resolution cannot fail. A store that cannot be read behaves as empty, and
//! a failed write only costs stability across restarts; both are logged.

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use canvas::doc::ActorId;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Local store key holding the anonymous id.
pub const ANONYMOUS_ID_KEY: &str = "vibeboard.anonymous_id";

const ANONYMOUS_NAME: &str = "Anonymous";

const PALETTE: [&str; 10] = [
    "#3B82F6", "#EF4444", "#10B981", "#F59E0B", "#8B5CF6", "#F97316", "#06B6D4", "#EC4899", "#84CC16", "#6366F1",
];

/// The participant a session acts as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub display_name: String,
    pub color: String,
}

/// Identity supplied by the (external) auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthenticatedUser {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Deterministic palette color for an actor id.
#[must_use]
pub fn color_for(id: &str) -> &'static str {
    let hash = id.encode_utf16().fold(0_i32, |h, unit| h.wrapping_shl(5).wrapping_sub(h).wrapping_add(i32::from(unit)));
    PALETTE[hash.unsigned_abs() as usize % PALETTE.len()]
}

/// Name shown next to an authenticated user's cursor: the profile name, else
/// the local part of their email, else "Anonymous".
#[must_use]
pub fn display_name_for(user: &AuthenticatedUser) -> String {
    let name = user.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let email_local = user.email.as_deref().and_then(|e| e.split('@').next()).filter(|n| !n.is_empty());
    name.or(email_local).unwrap_or(ANONYMOUS_NAME).to_owned()
}

/// Resolve the local actor. See the module docs for the rules.
pub fn resolve(user: Option<&AuthenticatedUser>, store: &dyn LocalStore) -> Actor {
    if let Some(user) = user {
        if store.get(ANONYMOUS_ID_KEY).is_some() {
            if let Err(e) = store.remove(ANONYMOUS_ID_KEY) {
                warn!(error = %e, "identity: failed to clear anonymous id");
            }
        }
        return Actor { id: user.id.clone(), display_name: display_name_for(user), color: color_for(&user.id).to_owned() };
    }

    let id = match store.get(ANONYMOUS_ID_KEY) {
        Some(id) if !id.is_empty() => id,
        _ => {
            let id = generate_anonymous_id();
            if let Err(e) = store.set(ANONYMOUS_ID_KEY, &id) {
                warn!(error = %e, "identity: failed to persist anonymous id");
            }
            debug!(%id, "identity: generated anonymous id");
            id
        }
    };
    let color = color_for(&id).to_owned();
    Actor { id, display_name: ANONYMOUS_NAME.to_owned(), color }
}

/// Random UUID v4 string: version and variant bits fixed, the rest random.
#[must_use]
pub fn generate_anonymous_id() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    uuid::Builder::from_random_bytes(bytes).into_uuid().hyphenated().to_string()
}

// =============================================================================
// LOCAL STORE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LocalStoreError {
    #[error("local store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("local store format: {0}")]
    Format(#[from] serde_json::Error),
}

/// Durable client-side key/value storage.
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// # Errors
    ///
    /// Returns an error if the value could not be persisted.
    fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError>;

    /// # Errors
    ///
    /// Returns an error if the removal could not be persisted.
    fn remove(&self, key: &str) -> Result<(), LocalStoreError>;
}

/// Process-lifetime store.
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryLocalStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryLocalStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
        Ok(())
    }
}

/// JSON object on disk, rewritten on every change.
#[derive(Debug)]
pub struct FileLocalStore {
    path: PathBuf,
}

impl FileLocalStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, String>, LocalStoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(HashMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, values: &HashMap<String, String>) -> Result<(), LocalStoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(values)?)?;
        Ok(())
    }
}

impl LocalStore for FileLocalStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.read_all() {
            Ok(mut values) => values.remove(key),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "identity: unreadable local store");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        let mut values = self.read_all().unwrap_or_default();
        values.insert(key.to_owned(), value.to_owned());
        self.write_all(&values)
    }

    fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        let mut values = self.read_all()?;
        if values.remove(key).is_some() {
            self.write_all(&values)?;
        }
        Ok(())
    }
}
