//! `RESOURCES.yml` persistence
//!
//! One file per app at `<root>/<app>/RESOURCES.yml`:
//! ```text
//! web:
//!   memory: 536870912
//!   cpu: 50
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::limits::LimitStore;

pub const LIMIT_FILE_NAME: &str = "RESOURCES.yml";

/// File mode for saved limit files (rw-r--r--)
pub const LIMIT_FILE_MODE: u32 = 0o644;

/// Loads and saves limit stores under a platform root directory
#[derive(Debug, Clone)]
pub struct LimitRepository {
    root: PathBuf,
}

impl LimitRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn app_root(&self, app: &str) -> PathBuf {
        self.root.join(app)
    }

    pub fn limit_file_path(&self, app: &str) -> PathBuf {
        self.app_root(app).join(LIMIT_FILE_NAME)
    }

    /// Load the store for `app`; `Ok(None)` when nothing was ever saved
    pub fn load(&self, app: &str) -> Result<Option<LimitStore>> {
        let path = self.limit_file_path(app);
        if !path.exists() {
            debug!("No limit file for {} at {:?}", app, path);
            return Ok(None);
        }

        let raw = fs::read_to_string(&path).map_err(|source| Error::Persistence {
            path: path.clone(),
            source,
        })?;

        if raw.trim().is_empty() {
            return Ok(Some(LimitStore::new()));
        }

        let store: LimitStore = serde_yaml::from_str(&raw).map_err(|e| {
            warn!("Rejecting limit file {:?}: {}", path, e);
            Error::Yaml(e)
        })?;
        debug!("Loaded limits for {} ({} processes)", app, store.len());
        Ok(Some(store))
    }

    /// Replace the stored file for `app` with `store`
    pub fn save(&self, store: &LimitStore, app: &str) -> Result<()> {
        let path = self.limit_file_path(app);
        let content = serde_yaml::to_string(store)?;

        fs::write(&path, content).map_err(|source| Error::Persistence {
            path: path.clone(),
            source,
        })?;
        set_file_mode(&path)?;

        debug!("Saved limits for {} to {:?}", app, path);
        Ok(())
    }
}

#[cfg(unix)]
fn set_file_mode(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(LIMIT_FILE_MODE)).map_err(|source| {
        Error::Persistence {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn set_file_mode(_path: &Path) -> Result<()> {
    Ok(())
}
