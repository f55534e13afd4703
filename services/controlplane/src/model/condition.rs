//! Ready condition and derived phase.
use crate::model::object::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const REASON_SETUP_COMPLETE: &str = "SetupComplete";
pub const REASON_DELETING: &str = "Deleting";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionType {
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Ready,
    NotReady,
    #[default]
    Unknown,
    Terminating,
}

/// Reconciliation bookkeeping embedded in every managed status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Readiness {
    #[serde(default)]
    pub observed_generation: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub phase: Phase,
}

impl Readiness {
    pub fn ready_condition(&self) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|condition| condition.condition_type == ConditionType::Ready)
    }

    pub fn is_ready_true(&self) -> bool {
        self.ready_condition()
            .is_some_and(|condition| condition.status == ConditionStatus::True)
    }

    pub fn has_ready(&self, status: ConditionStatus, reason: &str) -> bool {
        self.ready_condition()
            .is_some_and(|condition| condition.status == status && condition.reason == reason)
    }

    /// Set the Ready condition and recompute the phase.
    ///
    /// `last_transition_time` moves only when the status value changes.
    /// Returns `true` if anything changed.
    pub fn set_ready(&mut self, status: ConditionStatus, reason: &str, message: &str) -> bool {
        let now = Utc::now();
        let changed = match self
            .conditions
            .iter_mut()
            .find(|condition| condition.condition_type == ConditionType::Ready)
        {
            Some(existing) => {
                let mut changed = false;
                if existing.status != status {
                    existing.status = status;
                    existing.last_transition_time = now;
                    changed = true;
                }
                if existing.reason != reason {
                    existing.reason = reason.to_string();
                    changed = true;
                }
                if existing.message != message {
                    existing.message = message.to_string();
                    changed = true;
                }
                changed
            }
            None => {
                self.conditions.push(Condition {
                    condition_type: ConditionType::Ready,
                    status,
                    reason: reason.to_string(),
                    message: message.to_string(),
                    last_transition_time: now,
                });
                true
            }
        };
        let phase = derive_phase(self.ready_condition());
        let phase_changed = self.phase != phase;
        self.phase = phase;
        changed || phase_changed
    }
}

pub fn derive_phase(ready: Option<&Condition>) -> Phase {
    match ready {
        None => Phase::Unknown,
        Some(condition) => match condition.status {
            ConditionStatus::True => Phase::Ready,
            ConditionStatus::False if condition.reason == REASON_DELETING => Phase::Terminating,
            ConditionStatus::False => Phase::NotReady,
            ConditionStatus::Unknown => Phase::Unknown,
        },
    }
}

/// Kinds that carry a Ready condition.
pub trait Conditioned: Resource {
    fn readiness(&self) -> &Readiness;
    fn readiness_mut(&mut self) -> &mut Readiness;

    /// Ready for the current generation and not being deleted.
    fn is_ready(&self) -> bool {
        let meta = self.meta();
        !meta.is_terminating()
            && meta.generation == self.readiness().observed_generation
            && self.readiness().is_ready_true()
    }
}
