use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::quantity::{Quantity, QuantityError};

/// Memory range of a compute class, as quantity strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComputeClassMemory {
    #[serde(default)]
    pub min: String,
    #[serde(default)]
    pub max: String,
    #[serde(default)]
    pub default: String,
    /// When non-empty, the only sizes workloads may request.
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComputeClassMemoryError {
    #[error(transparent)]
    Quantity(#[from] QuantityError),

    #[error("default memory {default} is below the minimum {min}")]
    BelowMin { default: Quantity, min: Quantity },

    #[error("default memory {default} is above the maximum {max}")]
    AboveMax { default: Quantity, max: Quantity },

    #[error("minimum memory {min} is above the maximum {max}")]
    InvertedRange { min: Quantity, max: Quantity },

    #[error("default memory {0} is not one of the allowed values")]
    NotAllowed(Quantity),
}

/// Parsed form of [`ComputeClassMemory`]. Unset bounds stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMemory {
    pub min: Option<Quantity>,
    pub max: Option<Quantity>,
    pub default: Option<Quantity>,
    pub values: Vec<Quantity>,
}

fn parse_optional(s: &str) -> Result<Option<Quantity>, QuantityError> {
    if s.trim().is_empty() {
        return Ok(None);
    }
    Quantity::parse(s).map(Some)
}

impl ComputeClassMemory {
    pub fn parse(&self) -> Result<ParsedMemory, ComputeClassMemoryError> {
        let parsed = ParsedMemory {
            min: parse_optional(&self.min)?,
            max: parse_optional(&self.max)?,
            default: parse_optional(&self.default)?,
            values: self
                .values
                .iter()
                .map(|v| Quantity::parse(v))
                .collect::<Result<_, _>>()?,
        };

        if let (Some(min), Some(max)) = (parsed.min, parsed.max)
            && min > max
        {
            return Err(ComputeClassMemoryError::InvertedRange { min, max });
        }
        if let Some(default) = parsed.default {
            if let Some(min) = parsed.min
                && default < min
            {
                return Err(ComputeClassMemoryError::BelowMin { default, min });
            }
            if let Some(max) = parsed.max
                && default > max
            {
                return Err(ComputeClassMemoryError::AboveMax { default, max });
            }
            if !parsed.values.is_empty() && !parsed.values.contains(&default) {
                return Err(ComputeClassMemoryError::NotAllowed(default));
            }
        }
        Ok(parsed)
    }
}

impl ParsedMemory {
    /// Default memory in bytes, if the class defines one.
    pub fn default_bytes(&self) -> Option<u64> {
        self.default.map(|q| q.value())
    }
}

/// A named resource shape workloads can be placed on.
///
/// Project-scoped when `namespace` is set, cluster-scoped otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComputeClass {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    /// Marks the class used when nothing else selects one.
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub description: String,
    /// CPU granted per unit of memory.
    #[serde(default)]
    pub cpu_scaler: f64,
    #[serde(default)]
    pub memory: ComputeClassMemory,
    pub created_at: DateTime<Utc>,
}

impl ComputeClass {
    pub fn key(&self) -> String {
        match &self.namespace {
            Some(ns) => project_compute_class_key(ns, &self.name),
            None => cluster_compute_class_key(&self.name),
        }
    }
}

pub fn project_compute_class_key(ns: &str, name: &str) -> String {
    format!(
        "{}{}/{}",
        pkg_constants::state::PROJECT_COMPUTE_CLASSES_PREFIX,
        ns,
        name
    )
}

pub fn cluster_compute_class_key(name: &str) -> String {
    format!(
        "{}{}",
        pkg_constants::state::CLUSTER_COMPUTE_CLASSES_PREFIX,
        name
    )
}
