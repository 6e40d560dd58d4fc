use serde::{Deserialize, Serialize};

use crate::quantity::Quantity;

/// Controller configuration file (YAML).
///
/// Example `config.yaml`:
/// ```yaml
/// data-dir: /var/lib/allot/data
/// resync-interval-secs: 15
/// workload-memory-default: 256Mi
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerConfigFile {
    #[serde(default, alias = "data-dir")]
    pub data_dir: Option<String>,
    #[serde(default, alias = "resync-interval-secs")]
    pub resync_interval_secs: Option<u64>,
    #[serde(default, alias = "workload-memory-default")]
    pub workload_memory_default: Option<String>,
}

/// Cluster-wide defaults the offering resolver falls back to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OfferingDefaults {
    /// Memory in bytes given to workloads nothing else configures.
    pub workload_memory_default: Option<u64>,
}

impl OfferingDefaults {
    /// Build defaults from a quantity string such as `256Mi`.
    pub fn from_memory(memory: Option<&str>) -> anyhow::Result<Self> {
        let workload_memory_default = match memory {
            Some(m) if !m.trim().is_empty() => Some(
                Quantity::parse(m)
                    .map_err(|e| anyhow::anyhow!("invalid workload memory default: {}", e))?
                    .value(),
            ),
            _ => None,
        };
        Ok(Self {
            workload_memory_default,
        })
    }
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}
