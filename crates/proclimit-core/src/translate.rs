//! Rendering of stored limits for the container runtime and for humans

use serde::Serialize;

use crate::limits::{LimitStore, ResourceSet};
use crate::resource::{self, ResourceKind};

/// Runtime flags for `process` on a host with `host_cpus` logical CPUs
///
/// Empty when the process has no limits. Kinds without a runtime mapping
/// are skipped rather than passed as empty arguments.
pub fn docker_flags_for(store: &LimitStore, process: &str, host_cpus: usize) -> Vec<String> {
    let Some(resources) = store.get(process) else {
        return Vec::new();
    };

    resources
        .iter()
        .map(|(kind, magnitude)| kind.docker_flag(magnitude, host_cpus))
        .filter(|flag| !flag.is_empty())
        .collect()
}

/// [`docker_flags_for`] using this host's CPU count
pub fn docker_flags_for_host(store: &LimitStore, process: &str) -> Vec<String> {
    docker_flags_for(store, process, resource::host_cpu_count())
}

/// One stored limit, raw and human-readable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimitEntry {
    pub kind: ResourceKind,
    pub value: i64,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    pub process: String,
    pub limits: Vec<LimitEntry>,
}

impl ProcessReport {
    pub fn new(process: &str, resources: &ResourceSet) -> Self {
        let limits = resources
            .iter()
            .map(|(kind, value)| LimitEntry {
                kind,
                value,
                display: kind.format_limit(value),
            })
            .collect();

        Self {
            process: process.to_string(),
            limits,
        }
    }

    /// `web:\tmemory=512MiB\tcpu=50%`
    pub fn line(&self) -> String {
        let pairs: Vec<String> = self
            .limits
            .iter()
            .map(|entry| format!("{}={}", entry.kind, entry.display))
            .collect();
        format!("{}:\t{}", self.process, pairs.join("\t"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppReport {
    pub app: String,
    pub processes: Vec<ProcessReport>,
}

impl AppReport {
    pub fn new(app: &str, store: &LimitStore) -> Self {
        Self {
            app: app.to_string(),
            processes: store
                .iter()
                .map(|(process, resources)| ProcessReport::new(process, resources))
                .collect(),
        }
    }

    pub fn header(&self) -> String {
        format!("====={}=====", self.app)
    }

    pub fn lines(&self) -> Vec<String> {
        self.processes.iter().map(ProcessReport::line).collect()
    }
}

/// Header line plus one line per process
pub fn format_for_report(app: &str, store: &LimitStore) -> String {
    let report = AppReport::new(app, store);
    let mut out = vec![report.header()];
    out.extend(report.lines());
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::{parse_resource_list, Defaults};

    fn sample_store() -> LimitStore {
        let mut store = LimitStore::new();
        store.merge_set(
            "web",
            &parse_resource_list(&["memory=512m", "cpu=50"]).unwrap(),
            &Defaults::default(),
        );
        store.merge_set(
            "worker",
            &parse_resource_list(&["memory=2g"]).unwrap(),
            &Defaults::default(),
        );
        store
    }

    #[test]
    fn test_docker_flags_for_process() {
        let flags = docker_flags_for(&sample_store(), "web", 8);
        assert_eq!(flags.len(), 2);
        assert!(flags.contains(&"--memory=536870912".to_string()));
        assert!(flags.contains(&"--cpus=\"4.0\"".to_string()));
    }

    #[test]
    fn test_docker_flags_for_unknown_process() {
        assert!(docker_flags_for(&sample_store(), "clock", 8).is_empty());
    }

    #[test]
    fn test_docker_flags_for_empty_set() {
        let mut store = LimitStore::new();
        store.insert("web", ResourceSet::new());
        assert!(docker_flags_for(&store, "web", 8).is_empty());
    }

    #[test]
    fn test_docker_flags_never_empty_strings() {
        let flags = docker_flags_for_host(&sample_store(), "web");
        assert!(flags.iter().all(|flag| !flag.is_empty()));
    }

    #[test]
    fn test_process_line() {
        let store = sample_store();
        let report = ProcessReport::new("web", store.get("web").unwrap());
        assert_eq!(report.line(), "web:\tmemory=512MiB\tcpu=50%");
    }

    #[test]
    fn test_format_for_report() {
        let text = format_for_report("blog", &sample_store());
        assert_eq!(
            text,
            "=====blog=====\nweb:\tmemory=512MiB\tcpu=50%\nworker:\tmemory=2GiB"
        );
    }

    #[test]
    fn test_report_serializes_to_json_shape() {
        let report = AppReport::new("blog", &sample_store());
        assert_eq!(report.processes.len(), 2);
        assert_eq!(report.processes[0].limits[0].kind, ResourceKind::Memory);
        assert_eq!(report.processes[0].limits[0].value, 536_870_912);
        assert_eq!(report.processes[0].limits[0].display, "512MiB");
    }
}
