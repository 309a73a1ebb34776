//! Signed-in user and bearer token, persisted across runs.
//!
//! The store is an explicit object handed to whoever needs it; all reads and writes go
//! through a [`Storage`] backend (a JSON file on disk, or memory in tests). Nothing is
//! cached: every call hits the backend.

use crate::api::ApiError;
use crate::models::{AuthResponse, LoginCredentials, RegisterData, User};
use async_trait::async_trait;
use fs2::FileExt;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Storage key for the JSON-serialized [`User`].
pub const USER_KEY: &str = "user";
/// Storage key for the bearer token.
pub const TOKEN_KEY: &str = "token";

const UNREACHABLE: &str = "Unable to connect to the server";
const LOGIN_FAILED: &str = "Login failed";
const REGISTRATION_FAILED: &str = "Registration failed";

/// String key/value persistence behind the session store.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// In-process storage; contents are lost when dropped.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let mut g = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory storage poisoned"))?;
        g.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        let mut g = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory storage poisoned"))?;
        g.remove(key);
        Ok(())
    }
}

/// One JSON object file (e.g. `~/.dbchat/session.json`). Missing file = empty store.
/// Reads hold a shared lock and writes an exclusive one, so the CLI and desktop app
/// can share the file.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> BTreeMap<String, String> {
        match self.read_locked() {
            Ok(s) => parse_map(&s, &self.path),
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    log::warn!("reading session file {} failed: {}", self.path.display(), e);
                }
                BTreeMap::new()
            }
        }
    }

    /// Whole file under a shared lock, so a concurrent `update` is never seen half-written.
    fn read_locked(&self) -> io::Result<String> {
        let mut file = File::open(&self.path)?;
        FileExt::lock_shared(&file)?;
        let mut s = String::new();
        let result = file.read_to_string(&mut s);
        let _ = FileExt::unlock(&file);
        result.map(|_| s)
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        FileExt::lock_exclusive(&file)?;
        let result = (|| {
            let mut s = String::new();
            file.read_to_string(&mut s)?;
            let mut map = parse_map(&s, &self.path);
            f(&mut map);
            let out = serde_json::to_string_pretty(&map)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(out.as_bytes())?;
            file.flush()
        })();
        let _ = FileExt::unlock(&file);
        result
    }
}

fn parse_map(s: &str, path: &Path) -> BTreeMap<String, String> {
    if s.trim().is_empty() {
        return BTreeMap::new();
    }
    serde_json::from_str(s).unwrap_or_else(|e| {
        log::warn!("ignoring unreadable session file {}: {}", path.display(), e);
        BTreeMap::new()
    })
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.read_map().remove(key)
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.update(|m| {
            m.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.update(|m| {
            m.remove(key);
        })
    }
}

/// Remote side of login/register. [`crate::api::AuthClient`] is the real one.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, credentials: &LoginCredentials) -> Result<AuthResponse, ApiError>;
    async fn register(&self, data: &RegisterData) -> Result<AuthResponse, ApiError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// User-facing auth failure (server message, or a generic one).
    #[error("{0}")]
    Auth(String),
    #[error("session storage error: {0}")]
    Storage(#[from] io::Error),
    #[error("session encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Signed-in user and token over an injected [`Storage`].
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn Storage>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Store backed by a JSON file at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileStorage::new(path)))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Persisted user, or None when absent or unparseable.
    pub fn current_user(&self) -> Option<User> {
        let raw = self.storage.get(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(u) => Some(u),
            Err(e) => {
                log::debug!("stored user is not valid JSON, treating as signed out: {}", e);
                None
            }
        }
    }

    /// Id of the signed-in user, if any and non-empty.
    pub fn current_user_id(&self) -> Option<String> {
        self.current_user()
            .map(|u| u.id)
            .filter(|id| !id.trim().is_empty())
    }

    pub fn token(&self) -> Option<String> {
        self.storage.get(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    /// True when a token is stored.
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// True when a user record is stored. This is what gates private routes.
    pub fn has_session(&self) -> bool {
        self.current_user().is_some()
    }

    /// Log in and persist the returned user and token.
    pub async fn login<A: AuthBackend + ?Sized>(
        &self,
        auth: &A,
        credentials: &LoginCredentials,
    ) -> Result<AuthResponse, SessionError> {
        let res = auth
            .login(credentials)
            .await
            .map_err(|e| auth_error(e, LOGIN_FAILED))?;
        self.persist(&res)?;
        log::info!("logged in as {}", res.user.email);
        Ok(res)
    }

    /// Register and persist the returned user (and token, when the server issues one).
    pub async fn register<A: AuthBackend + ?Sized>(
        &self,
        auth: &A,
        data: &RegisterData,
    ) -> Result<AuthResponse, SessionError> {
        let res = auth
            .register(data)
            .await
            .map_err(|e| auth_error(e, REGISTRATION_FAILED))?;
        self.persist(&res)?;
        log::info!("registered {}", res.user.email);
        Ok(res)
    }

    /// Clear both user and token.
    pub fn logout(&self) -> Result<(), SessionError> {
        self.storage.remove(TOKEN_KEY)?;
        self.storage.remove(USER_KEY)?;
        log::info!("logged out");
        Ok(())
    }

    fn persist(&self, res: &AuthResponse) -> Result<(), SessionError> {
        self.storage
            .set(USER_KEY, &serde_json::to_string(&res.user)?)?;
        if let Some(ref token) = res.token {
            self.storage.set(TOKEN_KEY, &token.access_token)?;
        }
        Ok(())
    }
}

fn auth_error(err: ApiError, fallback: &str) -> SessionError {
    log::warn!("auth request failed: {}", err);
    if !err.server_responded() {
        return SessionError::Auth(UNREACHABLE.to_string());
    }
    SessionError::Auth(err.server_message().unwrap_or(fallback).to_string())
}
