//! Host platform collaborator
//!
//! Everything the core needs to know about apps, processes and restarts
//! goes through this trait so the limit logic can be exercised without a
//! real hosting platform.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::Result;

pub trait Platform {
    /// Base directory holding one subdirectory per app
    fn root(&self) -> Result<PathBuf>;

    /// Fails when `app` is malformed or does not exist
    fn verify_app_name(&self, app: &str) -> Result<()>;

    /// Every app on the host
    fn app_names(&self) -> Result<Vec<String>>;

    /// Processes currently declared for `app` (may be empty)
    fn process_names(&self, app: &str) -> Result<BTreeSet<String>>;

    fn is_deployed(&self, app: &str) -> bool;

    fn trigger_restart(&self, app: &str) -> Result<()>;
}
