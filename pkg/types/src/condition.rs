use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ConditionStatus {
    #[default]
    Unknown,
    Success,
    Error,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionStatus::Unknown => write!(f, "Unknown"),
            ConditionStatus::Success => write!(f, "Success"),
            ConditionStatus::Error => write!(f, "Error"),
        }
    }
}

/// A named status slot on an object (e.g. `quota`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: ConditionStatus,
    #[serde(default)]
    pub message: String,
    /// Last time `status` changed.
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    pub fn is_success(&self) -> bool {
        self.status == ConditionStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == ConditionStatus::Error
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Conditions(pub Vec<Condition>);

impl Conditions {
    pub fn get(&self, kind: &str) -> Option<&Condition> {
        self.0.iter().find(|c| c.kind == kind)
    }

    /// Write a condition slot. The transition time only moves when the status
    /// actually changes, so repeated writes of the same state are no-ops.
    pub fn set(&mut self, kind: &str, status: ConditionStatus, message: impl Into<String>) {
        let message = message.into();
        match self.0.iter_mut().find(|c| c.kind == kind) {
            Some(existing) => {
                if existing.status != status {
                    existing.last_transition_time = Utc::now();
                }
                existing.status = status;
                existing.message = message;
            }
            None => self.0.push(Condition {
                kind: kind.to_string(),
                status,
                message,
                last_transition_time: Utc::now(),
            }),
        }
    }
}
