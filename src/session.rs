use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::User;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionData {
    access_token: Option<String>,
    user: Option<User>,
}

/// Access token plus the signed-in user's profile, shared between the HTTP
/// layer (which reads the token and may log out) and the UI.
#[derive(Debug, Clone)]
pub struct Session {
    data: Arc<Mutex<SessionData>>,
    path: Option<PathBuf>,
}

impl Session {
    /// A session that lives only in memory.
    #[cfg(test)]
    pub fn ephemeral() -> Self {
        Self {
            data: Arc::new(Mutex::new(SessionData::default())),
            path: None,
        }
    }

    /// Loads the session stored at `path`; a missing file means signed out.
    pub fn load(path: &Path) -> Result<Self> {
        let data = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read session file: {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Corrupt session file: {}", path.display()))?
        } else {
            SessionData::default()
        };
        Ok(Self {
            data: Arc::new(Mutex::new(data)),
            path: Some(path.to_path_buf()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SessionData> {
        // a panic while holding the lock cannot leave the data half-written
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn token(&self) -> Option<String> {
        self.lock().access_token.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.lock().user.clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.lock().access_token.is_some()
    }

    pub fn sign_in(&self, access_token: String, user: User) -> Result<()> {
        {
            let mut data = self.lock();
            data.access_token = Some(access_token);
            data.user = Some(user);
        }
        self.save()
    }

    /// Forgets the token and removes the stored copy.
    pub fn logout(&self) {
        {
            let mut data = self.lock();
            if data.access_token.is_none() {
                return;
            }
            *data = SessionData::default();
        }
        tracing::warn!("Session cleared");
        if let Some(path) = &self.path {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::error!("Failed to remove session file {}: {}", path.display(), e);
                }
            }
        }
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(&*self.lock())?;
        std::fs::write(path, raw)
            .with_context(|| format!("Failed to write session file: {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            name: "Olena".to_string(),
            email: "olena@example.com".to_string(),
            phone: Some("0501234567".to_string()),
            photo: None,
            location: None,
        }
    }

    #[test]
    fn test_session_persists_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let session = Session::load(&path).unwrap();
        assert!(!session.is_signed_in());
        session.sign_in("tok-1".to_string(), user()).unwrap();

        let reloaded = Session::load(&path).unwrap();
        assert_eq!(reloaded.token().as_deref(), Some("tok-1"));
        assert_eq!(reloaded.user().unwrap().email, "olena@example.com");
    }

    #[test]
    fn test_logout_clears_memory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let session = Session::load(&path).unwrap();
        session.sign_in("tok-1".to_string(), user()).unwrap();
        let shared = session.clone();

        shared.logout();
        assert!(!session.is_signed_in());
        assert!(session.user().is_none());
        assert!(!path.exists());

        // second logout is a no-op
        shared.logout();
    }

    #[test]
    fn test_ephemeral_session_never_touches_disk() {
        let session = Session::ephemeral();
        session.sign_in("tok".to_string(), user()).unwrap();
        assert!(session.is_signed_in());
        session.logout();
        assert!(!session.is_signed_in());
    }
}
