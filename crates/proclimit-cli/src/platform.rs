//! Dokku-style host platform backed by the apps root directory
//!
//! Layout under the root:
//! ```text
//! <root>/<app>/DOKKU_SCALE       web=1\nworker=2
//! <root>/<app>/CONTAINER.web.1   present once deployed
//! <root>/<app>/RESOURCES.yml     written by proclimit
//! ```

use proclimit_core::{Error, Platform, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use tracing::debug;

pub const SCALE_FILE_NAME: &str = "DOKKU_SCALE";

pub struct DokkuPlatform {
    root: Option<PathBuf>,
    restart_command: Vec<String>,
}

impl DokkuPlatform {
    /// `root` of `None` makes every root-dependent call fail
    pub fn new(root: Option<PathBuf>, restart_command: Vec<String>) -> Self {
        Self {
            root,
            restart_command,
        }
    }

    fn root_dir(&self) -> Result<&Path> {
        self.root.as_deref().ok_or_else(|| {
            Error::Platform(
                "apps root is not configured (set DOKKU_ROOT or platform.root)".to_string(),
            )
        })
    }

    fn app_root(&self, app: &str) -> Result<PathBuf> {
        Ok(self.root_dir()?.join(app))
    }
}

fn app_name_regex() -> &'static Regex {
    static APP_NAME_RE: OnceLock<Regex> = OnceLock::new();
    APP_NAME_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9][^/:_A-Z]*$").expect("app name pattern is a valid regex")
    })
}

/// Lowercase alphanumeric start; no uppercase, colons, slashes or underscores
pub fn is_valid_app_name(name: &str) -> bool {
    app_name_regex().is_match(name)
}

/// Process names from `DOKKU_SCALE` content (`proc=count` per line)
pub fn parse_scale_file(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split('=').next())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

impl Platform for DokkuPlatform {
    fn root(&self) -> Result<PathBuf> {
        self.root_dir().map(Path::to_path_buf)
    }

    fn verify_app_name(&self, app: &str) -> Result<()> {
        if app.is_empty() {
            return Err(Error::App("Please specify an app".to_string()));
        }

        if !is_valid_app_name(app) {
            return Err(Error::App(format!(
                "Invalid app name {:?}: must begin with lowercase alphanumeric character, \
                 and cannot include uppercase characters, colons, or underscores",
                app
            )));
        }

        if !self.app_root(app)?.is_dir() {
            return Err(Error::App(format!("App {} does not exist", app)));
        }

        Ok(())
    }

    fn app_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.root_dir()?)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_valid_app_name(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn process_names(&self, app: &str) -> Result<BTreeSet<String>> {
        let path = self.app_root(app)?.join(SCALE_FILE_NAME);
        if !path.exists() {
            debug!("No {} for {}", SCALE_FILE_NAME, app);
            return Ok(BTreeSet::new());
        }
        let content = fs::read_to_string(&path)?;
        Ok(parse_scale_file(&content))
    }

    fn is_deployed(&self, app: &str) -> bool {
        let Ok(app_root) = self.app_root(app) else {
            return false;
        };
        let Ok(entries) = fs::read_dir(app_root) else {
            return false;
        };

        entries.filter_map(|entry| entry.ok()).any(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name == "CONTAINER" || name.starts_with("CONTAINER.")
        })
    }

    fn trigger_restart(&self, app: &str) -> Result<()> {
        let (program, args) = self
            .restart_command
            .split_first()
            .ok_or_else(|| Error::Platform("restart command is empty".to_string()))?;

        let output = Command::new(program)
            .args(args)
            .arg(app)
            .output()
            .map_err(|e| Error::Platform(format!("Failed to execute {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Platform(format!(
                "restart of {} failed: {}",
                app,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn platform_with_apps(apps: &[&str]) -> (TempDir, DokkuPlatform) {
        let dir = TempDir::new().unwrap();
        for app in apps {
            fs::create_dir(dir.path().join(app)).unwrap();
        }
        let platform = DokkuPlatform::new(Some(dir.path().to_path_buf()), vec!["true".into()]);
        (dir, platform)
    }

    #[test]
    fn test_app_name_validation() {
        assert!(is_valid_app_name("blog"));
        assert!(is_valid_app_name("my-app2"));
        assert!(is_valid_app_name("0day"));
        assert!(!is_valid_app_name("Blog"));
        assert!(!is_valid_app_name("my_app"));
        assert!(!is_valid_app_name("a:b"));
        assert!(!is_valid_app_name("-app"));
        assert!(!is_valid_app_name(""));
    }

    #[test]
    fn test_parse_scale_file() {
        let procs = parse_scale_file("web=1\nworker=2\n\n# comment\nclock=0\n");
        let procs: Vec<&str> = procs.iter().map(String::as_str).collect();
        assert_eq!(procs, vec!["clock", "web", "worker"]);
    }

    #[test]
    fn test_missing_root() {
        let platform = DokkuPlatform::new(None, vec!["true".into()]);
        assert!(matches!(platform.root(), Err(Error::Platform(_))));
        assert!(platform.verify_app_name("blog").is_err());
        assert!(!platform.is_deployed("blog"));
    }

    #[test]
    fn test_verify_app_name() {
        let (_dir, platform) = platform_with_apps(&["blog"]);
        assert!(platform.verify_app_name("blog").is_ok());
        assert!(matches!(platform.verify_app_name("shop"), Err(Error::App(_))));
        assert!(matches!(platform.verify_app_name("Blog"), Err(Error::App(_))));
        assert!(matches!(platform.verify_app_name(""), Err(Error::App(_))));
    }

    #[test]
    fn test_app_names_skip_hidden_and_files() {
        let (dir, platform) = platform_with_apps(&["shop", "blog", ".ssh"]);
        fs::write(dir.path().join("VHOST"), "example.com").unwrap();

        assert_eq!(platform.app_names().unwrap(), vec!["blog", "shop"]);
    }

    #[test]
    fn test_process_names() {
        let (dir, platform) = platform_with_apps(&["blog"]);
        assert!(platform.process_names("blog").unwrap().is_empty());

        fs::write(dir.path().join("blog").join(SCALE_FILE_NAME), "web=1\nworker=1\n").unwrap();
        let procs = platform.process_names("blog").unwrap();
        assert!(procs.contains("web"));
        assert!(procs.contains("worker"));
    }

    #[test]
    fn test_is_deployed() {
        let (dir, platform) = platform_with_apps(&["blog"]);
        assert!(!platform.is_deployed("blog"));

        fs::write(dir.path().join("blog").join("CONTAINER.web.1"), "abc123").unwrap();
        assert!(platform.is_deployed("blog"));
    }

    #[cfg(unix)]
    #[test]
    fn test_trigger_restart_status() {
        let (_dir, platform) = platform_with_apps(&["blog"]);
        assert!(platform.trigger_restart("blog").is_ok());

        let failing = DokkuPlatform::new(None, vec!["false".into()]);
        assert!(matches!(
            failing.trigger_restart("blog"),
            Err(Error::Platform(_))
        ));
    }

    #[test]
    fn test_trigger_restart_missing_program() {
        let platform = DokkuPlatform::new(None, vec!["proclimit-no-such-binary".into()]);
        assert!(platform.trigger_restart("blog").is_err());
    }
}
