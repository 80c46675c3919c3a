use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use base64::engine::{general_purpose, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::CredentialError;
use crate::models::complaint::AdminProfile;

/// Admin session token plus the profile it was issued for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub token: String,
    #[serde(default)]
    pub admin: AdminProfile,
}

impl StoredCredentials {
    pub fn new(token: impl Into<String>, admin: AdminProfile) -> Self {
        Self {
            token: token.into(),
            admin,
        }
    }
}

/// Where the admin token lives between requests.
pub trait CredentialProvider: Send + Sync {
    fn get(&self) -> Result<Option<StoredCredentials>, CredentialError>;
    fn set(&self, credentials: StoredCredentials) -> Result<(), CredentialError>;
    fn clear(&self) -> Result<(), CredentialError>;
}

/// Process-local credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    inner: Mutex<Option<StoredCredentials>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with a bare token, e.g. one forwarded by a caller.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(Some(StoredCredentials::new(token, AdminProfile::default()))),
        }
    }
}

impl CredentialProvider for MemoryCredentials {
    fn get(&self) -> Result<Option<StoredCredentials>, CredentialError> {
        let guard = self.inner.lock().map_err(|_| CredentialError::Poisoned)?;
        Ok(guard.clone())
    }

    fn set(&self, credentials: StoredCredentials) -> Result<(), CredentialError> {
        let mut guard = self.inner.lock().map_err(|_| CredentialError::Poisoned)?;
        *guard = Some(credentials);
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        let mut guard = self.inner.lock().map_err(|_| CredentialError::Poisoned)?;
        *guard = None;
        Ok(())
    }
}

/// Credential store persisted as a JSON file.
pub struct FileCredentials {
    path: PathBuf,
    file_mutex: Mutex<()>,
}

impl FileCredentials {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file_mutex: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialProvider for FileCredentials {
    fn get(&self) -> Result<Option<StoredCredentials>, CredentialError> {
        let _lock = self.file_mutex.lock().map_err(|_| CredentialError::Poisoned)?;

        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn set(&self, credentials: StoredCredentials) -> Result<(), CredentialError> {
        let _lock = self.file_mutex.lock().map_err(|_| CredentialError::Poisoned)?;

        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, serde_json::to_vec(&credentials)?)?;

        info!("Stored admin credentials at {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        let _lock = self.file_mutex.lock().map_err(|_| CredentialError::Poisoned)?;

        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Cleared admin credentials at {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Deserialize)]
struct TokenClaims {
    exp: Option<i64>,
}

/// Reads the `exp` claim of a JWT without verifying it.
///
/// Returns `None` for opaque tokens or tokens without an expiry.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: TokenClaims = serde_json::from_slice(&bytes).ok()?;
    claims.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
}

pub fn is_expired(token: &str, now: DateTime<Utc>) -> bool {
    match token_expiry(token) {
        Some(expiry) => {
            debug!("Admin token expires at {}", expiry);
            expiry <= now
        }
        None => false,
    }
}

/// Current bearer token, clearing it first if it has expired.
pub fn active_token(provider: &dyn CredentialProvider) -> Result<Option<String>, CredentialError> {
    let Some(credentials) = provider.get()? else {
        return Ok(None);
    };

    if is_expired(&credentials.token, Utc::now()) {
        warn!("Stored admin token has expired, clearing it");
        provider.clear()?;
        return Ok(None);
    }

    Ok(Some(credentials.token))
}
