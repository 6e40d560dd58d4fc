use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::condition::{Condition, Conditions};
use crate::quantity::Quantity;

/// Footprint of an app instance, as requested from or granted by the quota
/// authority. Two values are equal only when every field matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuotaResources {
    #[serde(default)]
    pub containers: u32,
    #[serde(default)]
    pub jobs: u32,
    #[serde(default)]
    pub images: u32,
    #[serde(default)]
    pub volumes: u32,
    #[serde(default)]
    pub volume_storage: Quantity,
    #[serde(default)]
    pub secrets: u32,
    #[serde(default)]
    pub cpu: Quantity,
    #[serde(default)]
    pub memory: Quantity,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuotaRequestSpec {
    #[serde(default)]
    pub resources: QuotaResources,
}

/// Written by the quota authority.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuotaRequestStatus {
    #[serde(default)]
    pub allocated_resources: QuotaResources,
    #[serde(default)]
    pub conditions: Conditions,
}

/// Allocation request for one app instance; shares its namespace and name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuotaRequest {
    pub name: String,
    pub namespace: String,
    pub spec: QuotaRequestSpec,
    #[serde(default)]
    pub status: QuotaRequestStatus,
    pub created_at: DateTime<Utc>,
}

impl QuotaRequest {
    pub fn key(&self) -> String {
        quota_request_key(&self.namespace, &self.name)
    }

    /// The authority's own condition, if it has written one.
    pub fn condition(&self) -> Option<&Condition> {
        self.status
            .conditions
            .get(pkg_constants::quota::QUOTA_REQUEST_CONDITION)
    }

    pub fn is_allocated(&self) -> bool {
        self.spec.resources == self.status.allocated_resources
    }
}

pub fn quota_request_key(ns: &str, name: &str) -> String {
    format!("{}{}/{}", pkg_constants::state::QUOTA_REQUESTS_PREFIX, ns, name)
}
