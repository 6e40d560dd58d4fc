use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-workload values with an optional app-wide fallback.
///
/// Lookups go `workloads[name]` first, then `all`. Keeping the fallback in its
/// own slot means no workload name can collide with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadMap<T> {
    /// Applies to every workload that has no entry of its own.
    #[serde(default)]
    pub all: Option<T>,
    #[serde(default)]
    pub workloads: BTreeMap<String, T>,
}

impl<T> Default for WorkloadMap<T> {
    fn default() -> Self {
        Self {
            all: None,
            workloads: BTreeMap::new(),
        }
    }
}

impl<T> WorkloadMap<T> {
    /// Value set for exactly this workload.
    pub fn specific(&self, name: &str) -> Option<&T> {
        self.workloads.get(name)
    }

    /// Value for this workload, falling back to the app-wide one.
    pub fn get(&self, name: &str) -> Option<&T> {
        self.specific(name).or(self.all.as_ref())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: T) -> Option<T> {
        self.workloads.insert(name.into(), value)
    }

    pub fn with_all(mut self, value: T) -> Self {
        self.all = Some(value);
        self
    }

    pub fn with(mut self, name: impl Into<String>, value: T) -> Self {
        self.insert(name, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_none() && self.workloads.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specific_entry_wins_over_all() {
        let map = WorkloadMap::default().with_all("shared").with("web", "large");
        assert_eq!(map.get("web"), Some(&"large"));
        assert_eq!(map.get("worker"), Some(&"shared"));
        assert_eq!(map.specific("worker"), None);
    }

    #[test]
    fn empty_name_is_an_ordinary_workload() {
        let map = WorkloadMap::default().with("", 1u64);
        assert_eq!(map.all, None);
        assert_eq!(map.get("other"), None);
        assert_eq!(map.get(""), Some(&1));
    }
}
