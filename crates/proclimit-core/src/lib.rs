//! proclimit Core Library
//!
//! Per-process resource limits for app hosting platforms: parsing of
//! human-readable limit expressions, the per-app limit store and its
//! `RESOURCES.yml` persistence, and rendering into container runtime flags.

pub mod commands;
pub mod error;
pub mod limits;
pub mod platform;
pub mod resource;
pub mod store;
pub mod translate;
pub mod units;

pub use commands::{LimitCommands, RestartStatus, SetOutcome, UnsetOutcome};
pub use error::{Error, Result};
pub use limits::{parse_resource_list, Defaults, LimitStore, ResourceSet};
pub use platform::Platform;
pub use resource::{format_limit_docker, host_cpu_count, KindRules, ResourceKind};
pub use store::{LimitRepository, LIMIT_FILE_NAME};
pub use translate::{
    docker_flags_for, docker_flags_for_host, format_for_report, AppReport, LimitEntry,
    ProcessReport,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
