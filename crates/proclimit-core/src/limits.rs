//! Per-process resource sets and the per-app limit store

use std::collections::btree_map::{self, BTreeMap};

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::resource::ResourceKind;

/// Limits for one process, keyed by kind
///
/// A missing kind means "runtime default", not zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResourceSet(BTreeMap<ResourceKind, i64>);

/// Every entry goes through [`ResourceSet::set`] and its kind's validator
impl<'de> Deserialize<'de> for ResourceSet {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = BTreeMap::<ResourceKind, i64>::deserialize(deserializer)?;
        let mut resources = ResourceSet::new();
        for (kind, magnitude) in entries {
            resources.set(kind, magnitude).map_err(de::Error::custom)?;
        }
        Ok(resources)
    }
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an already-parsed magnitude after running the kind's validator
    pub fn set(&mut self, kind: ResourceKind, magnitude: i64) -> Result<()> {
        (kind.rules().validate)(magnitude)?;
        self.0.insert(kind, magnitude);
        Ok(())
    }

    pub fn get(&self, kind: ResourceKind) -> Option<i64> {
        self.0.get(&kind).copied()
    }

    pub fn remove(&mut self, kind: ResourceKind) -> Option<i64> {
        self.0.remove(&kind)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, i64)> + '_ {
        self.0.iter().map(|(kind, value)| (*kind, *value))
    }

    /// Overwrite each entry of `other` in `self`, leaving the rest alone
    pub fn merge(&mut self, other: &ResourceSet) {
        for (kind, value) in other.iter() {
            self.0.insert(kind, value);
        }
    }
}

impl<'a> IntoIterator for &'a ResourceSet {
    type Item = (&'a ResourceKind, &'a i64);
    type IntoIter = btree_map::Iter<'a, ResourceKind, i64>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Parse `kind=value` entries into a resource set
///
/// Splits on the first `=`. Later entries for the same kind win.
pub fn parse_resource_list<S: AsRef<str>>(entries: &[S]) -> Result<ResourceSet> {
    let mut resources = ResourceSet::new();

    for entry in entries {
        let entry = entry.as_ref();
        let (name, value) = entry
            .split_once('=')
            .ok_or_else(|| Error::Parse(format!("invalid resource limit: {:?}", entry)))?;

        let kind = name.parse::<ResourceKind>()?;
        let magnitude = kind.parse_limit(value).map_err(|e| match e {
            Error::Parse(msg) => Error::Parse(format!(
                "invalid resource limit value {:?} for {}: {}",
                value, kind, msg
            )),
            other => other,
        })?;

        resources.0.insert(kind, magnitude);
    }

    Ok(resources)
}

/// Seed limits applied the first time a process gets any limit
///
/// Every read hands out an owned copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Defaults {
    resources: ResourceSet,
}

impl Defaults {
    pub fn new(resources: ResourceSet) -> Self {
        Self { resources }
    }

    /// Build from `kind -> expression` pairs, e.g. a config table
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let entries: Vec<String> = pairs
            .into_iter()
            .map(|(kind, value)| format!("{}={}", kind, value))
            .collect();
        Ok(Self::new(parse_resource_list(&entries)?))
    }

    pub fn resources(&self) -> ResourceSet {
        self.resources.clone()
    }
}

/// All process limits for one app
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LimitStore(BTreeMap<String, ResourceSet>);

impl LimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, process: &str) -> Option<&ResourceSet> {
        self.0.get(process)
    }

    pub fn insert(&mut self, process: impl Into<String>, resources: ResourceSet) {
        self.0.insert(process.into(), resources);
    }

    pub fn processes(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResourceSet)> {
        self.0.iter().map(|(name, set)| (name.as_str(), set))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Apply `limits` to `process`, seeding it from `defaults` on first use
    pub fn merge_set(
        &mut self,
        process: &str,
        limits: &ResourceSet,
        defaults: &Defaults,
    ) -> &ResourceSet {
        let resources = self
            .0
            .entry(process.to_string())
            .or_insert_with(|| defaults.resources());
        resources.merge(limits);
        resources
    }

    /// Remove `kinds` from `process`
    ///
    /// Returns `None` when the process has no entry, otherwise the kinds that
    /// were actually removed. The process entry stays even when emptied.
    pub fn unset_kinds(
        &mut self,
        process: &str,
        kinds: &[ResourceKind],
    ) -> Option<Vec<ResourceKind>> {
        let resources = self.0.get_mut(process)?;
        let mut removed = Vec::new();
        for kind in kinds {
            if resources.remove(*kind).is_some() && !removed.contains(kind) {
                removed.push(*kind);
            }
        }
        Some(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB_512: i64 = 536_870_912;

    #[test]
    fn test_parse_resource_list() {
        let set = parse_resource_list(&["memory=512m"]).unwrap();
        assert_eq!(set.get(ResourceKind::Memory), Some(MIB_512));
        assert_eq!(set.len(), 1);

        let set = parse_resource_list(&["memory=1g", "cpu=25"]).unwrap();
        assert_eq!(set.get(ResourceKind::Memory), Some(1_073_741_824));
        assert_eq!(set.get(ResourceKind::Cpu), Some(25));
    }

    #[test]
    fn test_parse_splits_on_first_separator() {
        let err = parse_resource_list(&["cpu=5=0"]).unwrap_err();
        assert!(matches!(err, Error::Parse(msg) if msg.contains("\"5=0\"")));
    }

    #[test]
    fn test_parse_later_duplicates_win() {
        let set = parse_resource_list(&["cpu=10", "cpu=20"]).unwrap();
        assert_eq!(set.get(ResourceKind::Cpu), Some(20));
    }

    #[test]
    fn test_parse_rejects_bad_entries() {
        assert!(matches!(
            parse_resource_list(&["memory"]),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            parse_resource_list(&["disk=10g"]),
            Err(Error::UnknownKind(_))
        ));
        assert!(matches!(
            parse_resource_list(&["memory=big"]),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            parse_resource_list(&["cpu=150"]),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_resource_set_validates() {
        let mut set = ResourceSet::new();
        assert!(set.set(ResourceKind::Cpu, 0).is_err());
        assert!(set.is_empty());
        set.set(ResourceKind::Cpu, 40).unwrap();
        assert_eq!(set.get(ResourceKind::Cpu), Some(40));
    }

    #[test]
    fn test_deserialize_validates_each_entry() {
        let set: ResourceSet = serde_yaml::from_str("memory: 1024\ncpu: 50\n").unwrap();
        assert_eq!(set.get(ResourceKind::Cpu), Some(50));

        let err = serde_yaml::from_str::<ResourceSet>("cpu: 500\n").unwrap_err();
        assert!(err.to_string().contains("got 500"));
    }

    #[test]
    fn test_merge_preserves_other_kinds() {
        let mut store = LimitStore::new();
        let defaults = Defaults::default();

        store.merge_set("web", &parse_resource_list(&["memory=512m"]).unwrap(), &defaults);
        store.merge_set("web", &parse_resource_list(&["cpu=50"]).unwrap(), &defaults);

        let web = store.get("web").unwrap();
        assert_eq!(web.get(ResourceKind::Memory), Some(MIB_512));
        assert_eq!(web.get(ResourceKind::Cpu), Some(50));
    }

    #[test]
    fn test_merge_overwrites_same_kind() {
        let mut store = LimitStore::new();
        let defaults = Defaults::default();

        store.merge_set("web", &parse_resource_list(&["cpu=50"]).unwrap(), &defaults);
        let web = store.merge_set("web", &parse_resource_list(&["cpu=75"]).unwrap(), &defaults);

        assert_eq!(web.get(ResourceKind::Cpu), Some(75));
        assert_eq!(web.len(), 1);
    }

    #[test]
    fn test_merge_leaves_other_processes() {
        let mut store = LimitStore::new();
        let defaults = Defaults::default();

        store.merge_set("web", &parse_resource_list(&["cpu=50"]).unwrap(), &defaults);
        store.merge_set("worker", &parse_resource_list(&["cpu=10"]).unwrap(), &defaults);

        assert_eq!(store.get("web").unwrap().get(ResourceKind::Cpu), Some(50));
        assert_eq!(store.get("worker").unwrap().get(ResourceKind::Cpu), Some(10));
    }

    #[test]
    fn test_defaults_seed_without_aliasing() {
        let defaults = Defaults::from_pairs([("memory", "256m")]).unwrap();
        let mut store = LimitStore::new();

        store.merge_set("web", &parse_resource_list(&["memory=1g"]).unwrap(), &defaults);
        store.merge_set("worker", &parse_resource_list(&["cpu=20"]).unwrap(), &defaults);

        assert_eq!(
            store.get("web").unwrap().get(ResourceKind::Memory),
            Some(1_073_741_824)
        );
        assert_eq!(
            store.get("worker").unwrap().get(ResourceKind::Memory),
            Some(268_435_456)
        );
        assert_eq!(
            defaults.resources().get(ResourceKind::Memory),
            Some(268_435_456)
        );
        assert_eq!(defaults.resources().get(ResourceKind::Cpu), None);
    }

    #[test]
    fn test_defaults_reject_invalid_values() {
        assert!(Defaults::from_pairs([("cpu", "500")]).is_err());
        assert!(Defaults::from_pairs([("gpu", "1")]).is_err());
    }

    #[test]
    fn test_unset_kinds() {
        let mut store = LimitStore::new();
        store.merge_set(
            "web",
            &parse_resource_list(&["memory=512m", "cpu=50"]).unwrap(),
            &Defaults::default(),
        );

        let removed = store.unset_kinds("web", &[ResourceKind::Cpu]).unwrap();
        assert_eq!(removed, vec![ResourceKind::Cpu]);
        assert_eq!(store.get("web").unwrap().get(ResourceKind::Memory), Some(MIB_512));
    }

    #[test]
    fn test_unset_absent_kind_changes_nothing() {
        let mut store = LimitStore::new();
        store.merge_set(
            "web",
            &parse_resource_list(&["memory=512m"]).unwrap(),
            &Defaults::default(),
        );
        let before = store.clone();

        let removed = store.unset_kinds("web", &[ResourceKind::Cpu]).unwrap();
        assert!(removed.is_empty());
        assert_eq!(store, before);
    }

    #[test]
    fn test_unset_unknown_process() {
        let mut store = LimitStore::new();
        assert!(store.unset_kinds("web", &[ResourceKind::Cpu]).is_none());
    }

    #[test]
    fn test_unset_all_keeps_process_entry() {
        let mut store = LimitStore::new();
        store.merge_set(
            "web",
            &parse_resource_list(&["memory=512m", "cpu=50"]).unwrap(),
            &Defaults::default(),
        );

        let removed = store
            .unset_kinds("web", &[ResourceKind::Memory, ResourceKind::Cpu, ResourceKind::Cpu])
            .unwrap();
        assert_eq!(removed.len(), 2);
        assert!(store.get("web").unwrap().is_empty());
        assert_eq!(store.processes().collect::<Vec<_>>(), vec!["web"]);
    }
}
