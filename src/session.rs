//! Session context.
//!
//! Holds `{ is_authenticated, token }`. It is built once at startup from the
//! session file and changes only through [`SessionContext::login`] and
//! [`SessionContext::logout`]. Only the token's presence is checked, never
//! its validity; the server decides that.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::models::Credentials;
use crate::store::SurveyStore;

#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    token: String,
    username: String,
    saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionContext {
    is_authenticated: bool,
    token: Option<String>,
    username: Option<String>,
    path: PathBuf,
}

impl SessionContext {
    /// An unauthenticated session persisted at `path`.
    pub fn anonymous(path: impl Into<PathBuf>) -> Self {
        Self {
            is_authenticated: false,
            token: None,
            username: None,
            path: path.into(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_token(path: impl Into<PathBuf>, token: &str) -> Self {
        Self {
            is_authenticated: true,
            token: Some(token.to_string()),
            username: Some("admin".to_string()),
            path: path.into(),
        }
    }

    /// Restores the session stored at `path`. A missing or unreadable file
    /// yields an unauthenticated session.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::anonymous(path),
        };

        match serde_json::from_str::<SessionFile>(&content) {
            Ok(file) if !file.token.is_empty() => Self {
                is_authenticated: true,
                token: Some(file.token),
                username: Some(file.username),
                path: path.to_path_buf(),
            },
            Ok(_) => Self::anonymous(path),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable session file");
                Self::anonymous(path)
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Exchanges credentials for a token and persists it. On failure the
    /// session is left unchanged.
    pub async fn login(&mut self, store: &dyn SurveyStore, credentials: &Credentials) -> Result<()> {
        let token = store.login(credentials).await?;

        let file = SessionFile {
            token: token.clone(),
            username: credentials.username.clone(),
            saved_at: Utc::now(),
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create session directory: {}", parent.display())
                })?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&file)?)
            .with_context(|| format!("Failed to write session file: {}", self.path.display()))?;

        self.is_authenticated = true;
        self.token = Some(token);
        self.username = Some(credentials.username.clone());
        Ok(())
    }

    /// Forgets the token and removes the session file.
    pub fn logout(&mut self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove session file: {}", self.path.display()))?;
        }
        self.is_authenticated = false;
        self.token = None;
        self.username = None;
        Ok(())
    }
}
