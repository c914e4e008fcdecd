use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{debug, trace};

use crate::domain::{AUTH_TOKEN_KEY, HistoryError};

/// A bearer token. `Debug` keeps the secret out of logs.
#[derive(Clone, PartialEq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// Persistent key/value storage of the client, a JSON object on disk.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    token_override: Option<String>,
}

impl CredentialStore {
    pub fn new(path: PathBuf, token_override: Option<String>) -> Self {
        Self {
            path,
            token_override,
        }
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("history-view")
            .join("storage.json")
    }

    /// Bearer token, if one is stored. Empty values count as absent.
    pub fn token(&self) -> Result<Option<BearerToken>, HistoryError> {
        if let Some(token) = self.token_override.as_ref().filter(|t| !t.is_empty()) {
            trace!("Using token from command line");
            return Ok(Some(BearerToken::new(token.as_str())));
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No credential store at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(self.storage_error(e.to_string())),
        };

        let entries: HashMap<String, serde_json::Value> =
            serde_json::from_str(&content).map_err(|e| self.storage_error(e.to_string()))?;

        Ok(entries
            .get(AUTH_TOKEN_KEY)
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .map(BearerToken::new))
    }

    fn storage_error(&self, reason: String) -> HistoryError {
        HistoryError::Storage {
            path: self.path.clone(),
            reason,
        }
    }
}
