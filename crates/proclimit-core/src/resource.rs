//! Resource kinds and their parse/validate/format rules
//!
//! Every kind carries a [`KindRules`] record. Adding a kind means adding a
//! variant and its record; `rules()` is an exhaustive match so the compiler
//! points at every place that needs updating.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sysinfo::{CpuRefreshKind, RefreshKind, System};

use crate::error::{Error, Result};
use crate::units::{self, UnitBase};

/// A constrainable resource
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Available memory inside the container, in bytes
    Memory,
    /// Share of the host's CPUs, in percentage points (1-100)
    Cpu,
}

/// Per-kind behaviour
pub struct KindRules {
    /// Name used on the command line and in `RESOURCES.yml`
    pub name: &'static str,
    /// Text -> magnitude
    pub parse: fn(&str) -> Result<i64>,
    /// Range check applied after `parse`
    pub validate: fn(i64) -> Result<()>,
    /// Magnitude -> text for reports
    pub format: fn(i64) -> String,
    /// Magnitude + host CPU count -> container runtime flag
    pub docker_flag: fn(i64, usize) -> String,
}

static MEMORY_RULES: KindRules = KindRules {
    name: "memory",
    parse: parse_memory,
    validate: accept_any,
    format: units::format_bytes,
    docker_flag: memory_docker_flag,
};

static CPU_RULES: KindRules = KindRules {
    name: "cpu",
    parse: parse_cpu,
    validate: validate_cpu,
    format: format_cpu,
    docker_flag: cpu_docker_flag,
};

impl ResourceKind {
    /// Every known kind, in display order
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Memory, ResourceKind::Cpu];

    pub fn rules(self) -> &'static KindRules {
        match self {
            ResourceKind::Memory => &MEMORY_RULES,
            ResourceKind::Cpu => &CPU_RULES,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.rules().name
    }

    /// Case-sensitive lookup; `None` for unknown names
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Parse and validate a limit expression for this kind
    pub fn parse_limit(self, text: &str) -> Result<i64> {
        let rules = self.rules();
        let value = (rules.parse)(text)?;
        (rules.validate)(value)?;
        Ok(value)
    }

    /// Human-readable rendering, e.g. `512MiB` or `50%`
    pub fn format_limit(self, magnitude: i64) -> String {
        (self.rules().format)(magnitude)
    }

    /// Container runtime flag for a host with `host_cpus` logical CPUs
    ///
    /// May be empty for kinds without a runtime mapping.
    pub fn docker_flag(self, magnitude: i64, host_cpus: usize) -> String {
        (self.rules().docker_flag)(magnitude, host_cpus)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| Error::UnknownKind(s.to_string()))
    }
}

/// Container runtime flag using the current host's CPU count
pub fn format_limit_docker(kind: ResourceKind, magnitude: i64) -> String {
    kind.docker_flag(magnitude, host_cpu_count())
}

/// Number of CPUs this process may run on (at least 1)
///
/// Honours the affinity mask and cgroup quota when the platform reports
/// them; otherwise falls back to every logical CPU on the host.
pub fn host_cpu_count() -> usize {
    if let Ok(count) = std::thread::available_parallelism() {
        return count.get();
    }
    let sys = System::new_with_specifics(RefreshKind::new().with_cpu(CpuRefreshKind::new()));
    sys.cpus().len().max(1)
}

fn parse_memory(text: &str) -> Result<i64> {
    units::parse_size(text, UnitBase::Binary)
}

fn accept_any(_: i64) -> Result<()> {
    Ok(())
}

fn memory_docker_flag(bytes: i64, _host_cpus: usize) -> String {
    format!("--memory={}", bytes)
}

fn parse_cpu(text: &str) -> Result<i64> {
    let text = text.strip_suffix('%').unwrap_or(text);
    if let Some(positive) = text.strip_prefix('-') {
        // A well-formed negative amount is a range error, not a syntax error
        let value = units::parse_size(positive, UnitBase::Decimal)?;
        return Err(Error::Validation(format!(
            "cpu must be between 1 and 100, got -{}",
            value
        )));
    }
    units::parse_size(text, UnitBase::Decimal)
}

fn validate_cpu(percent: i64) -> Result<()> {
    if percent <= 0 || percent > 100 {
        return Err(Error::Validation(format!(
            "cpu must be between 1 and 100, got {}",
            percent
        )));
    }
    Ok(())
}

fn format_cpu(percent: i64) -> String {
    format!("{}%", percent)
}

fn cpu_docker_flag(percent: i64, host_cpus: usize) -> String {
    let cores = host_cpus as f64 / 100.0 * percent as f64;
    format!("--cpus=\"{}\"", units::format_significant(cores, 2))
}
