use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tenant scope. Its name doubles as the namespace of everything it owns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    /// Compute class used when an app does not pick one.
    #[serde(default)]
    pub default_compute_class: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            labels: HashMap::new(),
            annotations: HashMap::new(),
            default_compute_class: None,
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> String {
        project_key(&self.name)
    }

    pub fn quota_enforced(&self) -> bool {
        self.annotations
            .get(pkg_constants::quota::ENFORCED_QUOTA_ANNOTATION)
            .is_some_and(|v| v == "true")
    }
}

pub fn project_key(name: &str) -> String {
    format!("{}{}", pkg_constants::state::PROJECTS_PREFIX, name)
}
