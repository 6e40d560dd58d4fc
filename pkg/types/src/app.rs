use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::condition::Conditions;
use crate::quantity::Quantity;
use crate::workload::WorkloadMap;

// --- Expanded app spec ---

/// A sidecar runs next to its parent container and cannot own sidecars itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Sidecar {
    pub image: String,
    /// Memory declared by the image, in bytes. Ignored by offering resolution.
    #[serde(default)]
    pub memory: Option<u64>,
}

/// A top-level container or job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Container {
    pub image: String,
    /// Replica count; unset means 1.
    #[serde(default)]
    pub scale: Option<u32>,
    /// Memory declared by the image, in bytes.
    #[serde(default)]
    pub memory: Option<u64>,
    #[serde(default)]
    pub sidecars: BTreeMap<String, Sidecar>,
}

impl Container {
    pub fn replicas(&self) -> u32 {
        self.scale.unwrap_or(1)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Image {
    #[serde(default)]
    pub image_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VolumeRequest {
    /// Requested size as a quantity string; empty or `"0"` means unsized.
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub class: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SecretRequest {
    #[serde(default, rename = "type")]
    pub kind: String,
}

/// The fully expanded workload descriptor of an app.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppSpec {
    #[serde(default)]
    pub containers: BTreeMap<String, Container>,
    #[serde(default)]
    pub jobs: BTreeMap<String, Container>,
    #[serde(default)]
    pub images: BTreeMap<String, Image>,
    #[serde(default)]
    pub volumes: BTreeMap<String, VolumeRequest>,
    #[serde(default)]
    pub secrets: BTreeMap<String, SecretRequest>,
}

// --- Bindings ---

/// Binds an app volume to an existing one. An empty `volume` with a `size`
/// resizes the volume the app would create.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VolumeBinding {
    pub target: String,
    #[serde(default)]
    pub volume: String,
    #[serde(default)]
    pub size: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SecretBinding {
    pub target: String,
    #[serde(default)]
    pub secret: String,
}

// --- Spec ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppInstanceSpec {
    #[serde(default)]
    pub image: String,
    /// Operator compute-class overrides.
    #[serde(default)]
    pub compute_classes: WorkloadMap<String>,
    /// Operator memory overrides, in bytes.
    #[serde(default)]
    pub memory: WorkloadMap<u64>,
    #[serde(default)]
    pub volumes: Vec<VolumeBinding>,
    #[serde(default)]
    pub secrets: Vec<SecretBinding>,
}

// --- Status ---

/// Memory, CPU scaling and compute class settled for one workload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResolvedOffering {
    #[serde(default)]
    pub class: String,
    /// Memory in bytes; `None` means nothing configured it.
    #[serde(default)]
    pub memory: Option<u64>,
    #[serde(default)]
    pub cpu_scaler: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResolvedOfferings {
    /// `all` holds the app-wide default offering.
    #[serde(default)]
    pub containers: WorkloadMap<ResolvedOffering>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResourceList {
    #[serde(default)]
    pub cpu: Option<Quantity>,
    #[serde(default)]
    pub memory: Option<Quantity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResourceRequirements {
    #[serde(default)]
    pub requests: ResourceList,
    #[serde(default)]
    pub limits: ResourceList,
}

/// Scheduling output for one workload, produced outside this crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Scheduling {
    #[serde(default)]
    pub requirements: ResourceRequirements,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppInstanceStatus {
    #[serde(default)]
    pub app_spec: AppSpec,
    #[serde(default)]
    pub resolved_offerings: ResolvedOfferings,
    #[serde(default)]
    pub scheduling: WorkloadMap<Scheduling>,
    #[serde(default)]
    pub conditions: Conditions,
}

// --- AppInstance ---

/// One running deployment of an app.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppInstance {
    pub name: String,
    pub namespace: String,
    pub spec: AppInstanceSpec,
    #[serde(default)]
    pub status: AppInstanceStatus,
    pub created_at: DateTime<Utc>,
}

impl AppInstance {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            spec: AppInstanceSpec::default(),
            status: AppInstanceStatus::default(),
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> String {
        app_instance_key(&self.namespace, &self.name)
    }
}

pub fn app_instance_key(ns: &str, name: &str) -> String {
    format!("{}{}/{}", pkg_constants::state::APP_INSTANCES_PREFIX, ns, name)
}
