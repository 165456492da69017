use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::errors::IntakeError;

/// One active session per device, stored under this fixed key.
pub const ACTIVE_SESSION_KEY: &str = "active_scan_session";

/// What survives an interrupted session: only the tracking number and when it was saved.
///
/// Scan counts are never persisted. Progress is re-read live on resume.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub tracking_number: String,
    pub saved_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl SessionSnapshot {
    pub fn new(tracking_number: impl Into<String>, device_id: Option<String>) -> Self {
        Self {
            tracking_number: tracking_number.into(),
            saved_at: Utc::now(),
            device_id,
        }
    }

    /// Older than `max_age` at `now`. A snapshot dated in the future is never stale.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now.signed_duration_since(self.saved_at) >= max_age
    }
}

/// Offered on start-up when a recent snapshot still points at an incomplete group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResumeOffer {
    pub tracking_number: String,
    pub saved_at: DateTime<Utc>,
    pub declared: u64,
    pub inbounded: u64,
}

/// Durable device-local storage for the single session snapshot.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), IntakeError>;
    async fn load(&self) -> Result<Option<SessionSnapshot>, IntakeError>;
    async fn clear(&self) -> Result<(), IntakeError>;
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    snapshot: Mutex<Option<SessionSnapshot>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populates the store, as if a previous process had saved it.
    pub fn with_snapshot(snapshot: SessionSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<SessionSnapshot>> {
        match self.snapshot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn current(&self) -> Option<SessionSnapshot> {
        self.slot().clone()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), IntakeError> {
        *self.slot() = Some(snapshot.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<SessionSnapshot>, IntakeError> {
        Ok(self.slot().clone())
    }

    async fn clear(&self) -> Result<(), IntakeError> {
        *self.slot() = None;
        Ok(())
    }
}

/// JSON file named after [`ACTIVE_SESSION_KEY`] inside `dir`.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", ACTIVE_SESSION_KEY))
    }

    fn temp_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json.tmp", ACTIVE_SESSION_KEY))
    }
}

fn store_error(action: &str, err: impl std::fmt::Display) -> IntakeError {
    IntakeError::SessionStore(format!("Failed to {} session snapshot: {}", action, err))
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), IntakeError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| store_error("prepare", e))?;

        let body = serde_json::to_vec_pretty(snapshot).map_err(|e| store_error("encode", e))?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, body)
            .await
            .map_err(|e| store_error("write", e))?;
        tokio::fs::rename(&temp, self.path())
            .await
            .map_err(|e| store_error("write", e))?;

        debug!(path = %self.path().display(), "Session snapshot saved");
        Ok(())
    }

    async fn load(&self) -> Result<Option<SessionSnapshot>, IntakeError> {
        let body = match tokio::fs::read(self.path()).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(store_error("read", e)),
        };

        match serde_json::from_slice(&body) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!(path = %self.path().display(), error = %e, "Ignoring unreadable session snapshot");
                Ok(None)
            }
        }
    }

    async fn clear(&self) -> Result<(), IntakeError> {
        match tokio::fs::remove_file(self.path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(store_error("clear", e)),
        }
    }
}
