//! set / unset / report / docker-options over a [`Platform`]
//!
//! Each call does at most one load and one save. Nothing here exits the
//! process; callers decide what to do with errors and outcomes.

use tracing::{info, warn};

use crate::error::Result;
use crate::limits::{parse_resource_list, Defaults, LimitStore, ResourceSet};
use crate::platform::Platform;
use crate::resource::{self, ResourceKind};
use crate::store::LimitRepository;
use crate::translate::{self, AppReport};

/// What happened to the app restart after a change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartStatus {
    /// Restart not requested or nothing changed
    Skipped,
    /// App has no running containers
    NotDeployed,
    Triggered,
    /// Trigger ran but failed; limits are still saved
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetOutcome {
    /// The process's limits after the merge
    pub resources: ResourceSet,
    pub restart: RestartStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsetOutcome {
    /// No limit file for the app
    NoLimitsForApp,
    /// The app has limits but none for this process
    NoLimitsForProcess,
    /// Kinds actually removed (possibly none)
    Unset {
        removed: Vec<ResourceKind>,
        restart: RestartStatus,
    },
}

pub struct LimitCommands<'a, P: Platform> {
    platform: &'a P,
    repo: LimitRepository,
    defaults: Defaults,
    host_cpus: usize,
}

impl<'a, P: Platform> LimitCommands<'a, P> {
    /// Resolves the platform root; fails if it is unavailable
    pub fn new(platform: &'a P, defaults: Defaults) -> Result<Self> {
        let repo = LimitRepository::new(platform.root()?);
        Ok(Self {
            platform,
            repo,
            defaults,
            host_cpus: resource::host_cpu_count(),
        })
    }

    /// Override the CPU count used for `--cpus` rendering
    pub fn with_host_cpus(mut self, host_cpus: usize) -> Self {
        self.host_cpus = host_cpus.max(1);
        self
    }

    pub fn repository(&self) -> &LimitRepository {
        &self.repo
    }

    /// Merge `raw_limits` (`kind=value`) into the limits of `process`
    ///
    /// Input is fully parsed before anything is read or written.
    pub fn set<S: AsRef<str>>(
        &self,
        app: &str,
        process: &str,
        raw_limits: &[S],
        restart: bool,
    ) -> Result<SetOutcome> {
        self.platform.verify_app_name(app)?;
        let new_limits = parse_resource_list(raw_limits)?;

        let known = self.platform.process_names(app)?;
        if !known.contains(process) {
            warn!(
                "Process \"{}\" does not exist for app {}, setting anyway",
                process, app
            );
        }

        let mut store = self.repo.load(app)?.unwrap_or_default();
        let resources = store
            .merge_set(process, &new_limits, &self.defaults)
            .clone();
        self.repo.save(&store, app)?;

        for (kind, value) in new_limits.iter() {
            info!(
                "Set {} for {}/{} to {}",
                kind,
                app,
                process,
                kind.format_limit(value)
            );
        }

        let restart = if restart {
            self.restart(app)
        } else {
            RestartStatus::Skipped
        };

        Ok(SetOutcome { resources, restart })
    }

    /// Remove the named kinds from `process`; unknown names are ignored
    pub fn unset<S: AsRef<str>>(
        &self,
        app: &str,
        process: &str,
        kind_names: &[S],
        restart: bool,
    ) -> Result<UnsetOutcome> {
        self.platform.verify_app_name(app)?;

        let kinds: Vec<ResourceKind> = kind_names
            .iter()
            .filter_map(|name| ResourceKind::from_name(name.as_ref()))
            .collect();

        let Some(mut store) = self.repo.load(app)? else {
            info!("No limits set for \"{}\"", app);
            return Ok(UnsetOutcome::NoLimitsForApp);
        };

        let Some(removed) = store.unset_kinds(process, &kinds) else {
            info!("No limits set for \"{}\"", process);
            return Ok(UnsetOutcome::NoLimitsForProcess);
        };

        if removed.is_empty() {
            info!("No limits set for \"{}\" matching the given types", process);
            return Ok(UnsetOutcome::Unset {
                removed,
                restart: RestartStatus::Skipped,
            });
        }

        self.repo.save(&store, app)?;
        for kind in &removed {
            info!("Unsetting \"{}\" for {}/{}", kind, app, process);
        }

        let restart = if restart {
            self.restart(app)
        } else {
            RestartStatus::Skipped
        };

        Ok(UnsetOutcome::Unset { removed, restart })
    }

    /// Reports for one app or, with `None`, every app that has limits
    pub fn report(&self, app: Option<&str>) -> Result<Vec<AppReport>> {
        let apps = match app {
            Some(app) => {
                self.platform.verify_app_name(app)?;
                vec![app.to_string()]
            }
            None => self.platform.app_names()?,
        };

        let mut reports = Vec::new();
        for app in apps {
            if let Some(store) = self.repo.load(&app)? {
                reports.push(AppReport::new(&app, &store));
            }
        }
        Ok(reports)
    }

    /// Runtime flags for `process`; empty when no limits are stored
    pub fn docker_options(&self, app: &str, process: &str) -> Result<Vec<String>> {
        self.platform.verify_app_name(app)?;
        let store: LimitStore = self.repo.load(app)?.unwrap_or_default();
        Ok(translate::docker_flags_for(&store, process, self.host_cpus))
    }

    fn restart(&self, app: &str) -> RestartStatus {
        if !self.platform.is_deployed(app) {
            warn!("App {} has not been deployed, not restarting", app);
            return RestartStatus::NotDeployed;
        }

        info!("Restarting app {}", app);
        match self.platform.trigger_restart(app) {
            Ok(()) => RestartStatus::Triggered,
            Err(e) => {
                warn!("Failure while restarting app {}: {}", app, e);
                RestartStatus::Failed(e.to_string())
            }
        }
    }
}
