//! Auth session store
//!
//! Holds the bearer token, refresh token, user profile and the
//! pending-email-verification marker, persisted as a small JSON file.
//! Identity changes (sign in as a different user, sign out) are announced on
//! the event bus as `SessionChanged`.

use std::path::{Path, PathBuf};

use asincheck_common::api::UserProfile;
use asincheck_common::events::{AsincheckEvent, EventBus};
use asincheck_common::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Persisted session contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    /// Set after a login attempt the backend refused until the email is verified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_verification_email: Option<String>,
}

pub struct SessionStore {
    path: PathBuf,
    data: RwLock<SessionData>,
    event_bus: EventBus,
}

impl SessionStore {
    /// Load the session file; a missing or unreadable file yields an empty session
    pub async fn load(path: impl Into<PathBuf>, event_bus: EventBus) -> Result<Self> {
        let path = path.into();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<SessionData>(&content) {
                Ok(data) => data,
                Err(e) => {
                    warn!("Ignoring corrupt session file {}: {}", path.display(), e);
                    SessionData::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No session file at {}", path.display());
                SessionData::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
            event_bus,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn token(&self) -> Option<String> {
        self.data.read().await.token.clone()
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.data.read().await.refresh_token.clone()
    }

    pub async fn user(&self) -> Option<UserProfile> {
        self.data.read().await.user.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.data.read().await.token.is_some()
    }

    pub async fn pending_verification_email(&self) -> Option<String> {
        self.data.read().await.pending_verification_email.clone()
    }

    pub async fn snapshot(&self) -> SessionData {
        self.data.read().await.clone()
    }

    /// Store credentials after a successful login
    pub async fn sign_in(
        &self,
        token: String,
        refresh_token: Option<String>,
        user: UserProfile,
    ) -> Result<()> {
        let identity_changed = {
            let mut data = self.data.write().await;
            let changed = data.user.as_ref().map(|u| u.id.as_str()) != Some(user.id.as_str());
            data.token = Some(token);
            data.refresh_token = refresh_token;
            data.user = Some(user.clone());
            data.pending_verification_email = None;
            self.persist(&data).await?;
            changed
        };

        info!(user_id = %user.id, "Signed in as {}", user.email);
        if identity_changed {
            self.event_bus.emit_lossy(AsincheckEvent::SessionChanged {
                user: Some(user),
                timestamp: chrono::Utc::now(),
            });
        }
        Ok(())
    }

    /// Replace tokens after a refresh; the identity stays the same
    pub async fn update_tokens(&self, token: String, refresh_token: Option<String>) -> Result<()> {
        let mut data = self.data.write().await;
        data.token = Some(token);
        if refresh_token.is_some() {
            data.refresh_token = refresh_token;
        }
        self.persist(&data).await
    }

    pub async fn mark_pending_verification(&self, email: &str) -> Result<()> {
        let mut data = self.data.write().await;
        data.pending_verification_email = Some(email.to_string());
        self.persist(&data).await
    }

    /// Forget credentials and announce the logout
    pub async fn sign_out(&self) -> Result<()> {
        let was_signed_in = {
            let mut data = self.data.write().await;
            let was_signed_in = data.token.is_some() || data.user.is_some();
            *data = SessionData::default();
            self.persist(&data).await?;
            was_signed_in
        };

        if was_signed_in {
            info!("Signed out");
            self.event_bus.emit_lossy(AsincheckEvent::SessionChanged {
                user: None,
                timestamp: chrono::Utc::now(),
            });
        }
        Ok(())
    }

    /// Write atomically (temp file + rename), owner-only on Unix
    async fn persist(&self, data: &SessionData) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(data)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}
