//! Session persistence.
//!
//! Stores the token and the user in the platform-specific config directory:
//! - Linux: ~/.config/tessera/session.json
//! - macOS: ~/Library/Application Support/tessera/session.json
//! - Windows: %APPDATA%/tessera/session.json

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tessera_application::ports::{Clock, IdentityStore, StoreError, TokenStore};
use tessera_domain::{Identity, SessionRecord, Token};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::serialization::{from_json_bytes, to_json_stable_bytes};

const APP_DIR: &str = "tessera";
const SESSION_FILE: &str = "session.json";

/// Token and identity store backed by a single JSON file.
///
/// The file is read once when the store is opened; reads are served from
/// memory and every mutation is written through before it becomes visible.
pub struct FileTokenStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    record: Mutex<SessionRecord>,
}

impl FileTokenStore {
    /// Opens the store at `path`, starting empty if the file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let path = path.into();
        let record = match fs::read(&path).await {
            Ok(bytes) => {
                from_json_bytes(&bytes).map_err(|e| StoreError::Serialization(e.to_string()))?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SessionRecord::new(),
            Err(e) => return Err(StoreError::Io(format!("{}: {e}", path.display()))),
        };
        debug!(path = %path.display(), empty = record.is_empty(), "session file opened");

        Ok(Self {
            path,
            clock,
            record: Mutex::new(record),
        })
    }

    /// Default location of the session file, if the platform has a config
    /// directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join(SESSION_FILE))
    }

    /// The file this store writes to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A copy of the record as last written.
    pub async fn snapshot(&self) -> SessionRecord {
        self.record.lock().await.clone()
    }

    async fn update(&self, change: impl FnOnce(&mut SessionRecord) + Send) -> Result<(), StoreError> {
        let mut record = self.record.lock().await;
        let mut next = record.clone();
        change(&mut next);
        next.updated_at = Some(self.clock.now());

        self.write(&next).await?;
        *record = next;
        Ok(())
    }

    async fn write(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let io = |e: std::io::Error| StoreError::Io(format!("{}: {e}", self.path.display()));

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(io)?;
        }
        let content =
            to_json_stable_bytes(record).map_err(|e| StoreError::Serialization(e.to_string()))?;

        // Staged then renamed; readers never see a partial file.
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, content).await.map_err(io)?;
        fs::rename(&staging, &self.path).await.map_err(io)?;

        debug!(path = %self.path.display(), "session file written");
        Ok(())
    }
}

impl std::fmt::Debug for FileTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileTokenStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self) -> Result<Option<Token>, StoreError> {
        Ok(self.record.lock().await.token.clone())
    }

    async fn set(&self, token: &Token) -> Result<(), StoreError> {
        let token = token.clone();
        info!(token = %token.preview(), "storing access token");
        self.update(move |record| record.token = Some(token)).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        info!("clearing access token");
        self.update(|record| record.token = None).await
    }
}

#[async_trait]
impl IdentityStore for FileTokenStore {
    async fn identity(&self) -> Result<Option<Identity>, StoreError> {
        Ok(self.record.lock().await.user.clone())
    }

    async fn set_identity(&self, identity: &Identity) -> Result<(), StoreError> {
        let identity = identity.clone();
        self.update(move |record| record.user = Some(identity)).await
    }

    async fn clear_identity(&self) -> Result<(), StoreError> {
        self.update(|record| record.user = None).await
    }
}
