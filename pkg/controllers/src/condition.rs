use pkg_types::condition::{ConditionStatus, Conditions};
use std::fmt::Display;

/// Writes one named condition slot. Each call replaces the previous state.
pub struct ConditionSetter<'a> {
    conditions: &'a mut Conditions,
    kind: &'static str,
}

impl<'a> ConditionSetter<'a> {
    pub fn new(conditions: &'a mut Conditions, kind: &'static str) -> Self {
        Self { conditions, kind }
    }

    pub fn success(&mut self) {
        self.conditions.set(self.kind, ConditionStatus::Success, "");
    }

    pub fn error(&mut self, err: impl Display) {
        self.conditions
            .set(self.kind, ConditionStatus::Error, err.to_string());
    }

    pub fn unknown(&mut self, message: &str) {
        self.conditions
            .set(self.kind, ConditionStatus::Unknown, message);
    }
}
