//! Status conditions.
//!
//! Conditions are keyed by type. Setting a condition with an unchanged status
//! keeps its transition time, so rewriting the same state never produces a
//! status diff.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The revision is the one selected for publication.
pub const REVISION_PUBLISHED: &str = "RevisionPublished";
/// The revision must not be published.
pub const REVISION_TAINTED: &str = "RevisionTainted";
/// Set by other controllers to force the revision to be pushed again.
pub const RESOURCES_OUT_OF_SYNC: &str = "ResourcesOutOfSync";
/// The desired-state record cannot serve its desired version.
pub const CACHE_OUT_OF_SYNC: &str = "CacheOutOfSync";

/// Status of a condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// A single observation about an object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// A condition with status `True`, stamped now.
    pub fn truthy(
        condition_type: impl Into<String>,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(condition_type, ConditionStatus::True, reason, message)
    }

    pub fn new(
        condition_type: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            condition_type: condition_type.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }
}

/// Ordered set of conditions, at most one per type.
///
/// # Example
///
/// ```rust
/// use xds_revision::api::{Condition, Conditions, REVISION_TAINTED};
///
/// let mut conditions = Conditions::default();
/// assert!(conditions.set(Condition::truthy(REVISION_TAINTED, "ResourceDecodeError", "bad listener")));
/// assert!(!conditions.set(Condition::truthy(REVISION_TAINTED, "ResourceDecodeError", "bad listener")));
/// assert!(conditions.is_true_for(REVISION_TAINTED));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conditions(Vec<Condition>);

impl Conditions {
    pub fn get(&self, condition_type: &str) -> Option<&Condition> {
        self.0.iter().find(|c| c.condition_type == condition_type)
    }

    /// Whether a condition of this type exists with status `True`.
    pub fn is_true_for(&self, condition_type: &str) -> bool {
        self.get(condition_type)
            .is_some_and(|c| c.status == ConditionStatus::True)
    }

    /// Insert or replace a condition. Returns whether anything changed.
    pub fn set(&mut self, mut condition: Condition) -> bool {
        match self
            .0
            .iter_mut()
            .find(|c| c.condition_type == condition.condition_type)
        {
            Some(existing) => {
                if existing.status == condition.status
                    && existing.reason == condition.reason
                    && existing.message == condition.message
                {
                    return false;
                }
                if existing.status == condition.status {
                    condition.last_transition_time = existing.last_transition_time;
                }
                *existing = condition;
                true
            }
            None => {
                self.0.push(condition);
                true
            }
        }
    }

    /// Remove a condition. Returns whether it was present.
    pub fn remove(&mut self, condition_type: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|c| c.condition_type != condition_type);
        before != self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
