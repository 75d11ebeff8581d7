//! Persisted session and the auth guard
//!
//! The session is a flat string map saved as JSON in the data directory.
//! Every write goes straight to disk.

use crate::client::LoginResponse;
use chrono::{DateTime, Utc};
use sidekick_common::{
    DEFAULT_USER_NAME, Result, SESSION_FILE, SidekickError, parse_numeric_id, session_keys,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File-backed key/value store
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl SessionStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };
        debug!("Opened session store {} ({} keys)", path.display(), values.len());
        Ok(Self { path, values })
    }

    /// Open `session.json` inside a data directory
    pub fn in_data_dir(data_dir: &Path) -> Result<Self> {
        Self::open(data_dir.join(SESSION_FILE))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        self.values.insert(key.to_string(), value.into());
        self.persist()
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    /// Forget everything
    pub fn clear(&mut self) -> Result<()> {
        self.values.clear();
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.values)?)?;
        Ok(())
    }
}

/// Typed view of the stored session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub user_name: String,
    pub user_email: Option<String>,
    pub user_id: Option<i64>,
    pub session_id: Option<i64>,
    pub logged_in_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn load(store: &SessionStore) -> Self {
        Self {
            token: store
                .get(session_keys::TOKEN)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            user_name: store
                .get(session_keys::USER_NAME)
                .filter(|n| !n.is_empty())
                .unwrap_or(DEFAULT_USER_NAME)
                .to_string(),
            user_email: store.get(session_keys::USER_EMAIL).map(str::to_string),
            user_id: parse_numeric_id(store.get(session_keys::USER_ID)),
            session_id: parse_numeric_id(store.get(session_keys::SESSION_ID)),
            logged_in_at: store
                .get(session_keys::LOGGED_IN_AT)
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }

    /// Both ids, when the session can chat
    pub fn ids(&self) -> Option<(i64, i64)> {
        self.user_id.zip(self.session_id)
    }

    /// Record a successful login
    pub fn save_login(store: &mut SessionStore, login: &LoginResponse, email: &str) -> Result<Self> {
        store.set(session_keys::TOKEN, login.token.as_str())?;
        store.set(session_keys::USER_ID, login.user_id.to_string())?;
        store.set(session_keys::SESSION_ID, login.session_id.to_string())?;
        store.set(
            session_keys::USER_EMAIL,
            login.email.as_deref().unwrap_or(email),
        )?;
        if let Some(name) = login.name.as_deref().filter(|n| !n.is_empty()) {
            store.set(session_keys::USER_NAME, name)?;
        }
        store.set(session_keys::LOGGED_IN_AT, Utc::now().to_rfc3339())?;
        info!("Stored session for user {}", login.user_id);
        Ok(Self::load(store))
    }

    /// Record the account details returned at signup
    pub fn save_signup(store: &mut SessionStore, name: &str, email: &str) -> Result<()> {
        store.set(session_keys::USER_NAME, name)?;
        store.set(session_keys::USER_EMAIL, email)
    }
}

/// Gate for commands that need a logged-in user
pub struct AuthGuard;

impl AuthGuard {
    /// The stored session when a token is present
    pub fn verify(store: &SessionStore) -> Result<Session> {
        let session = Session::load(store);
        if session.token.is_none() {
            return Err(SidekickError::Auth(
                "Not logged in. Run `sidekick login` first.".to_string(),
            ));
        }
        Ok(session)
    }
}
