//! Experiment configuration, lifecycle, and the pre-registration lock.
//!
//! An experiment pairs one independent habit with one dependent habit and a
//! set of named conditions cycled by the assignment scheduler. Configuration
//! invariants are checked at validation time, before activation — they are
//! construction-time failures, never runtime scheduler failures. The moment
//! an experiment goes ACTIVE its hypothesis is frozen (the pre-registration
//! lock): any later write that would change the text is rejected.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ExperimentError;

/// Lifecycle state of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperimentStatus {
    #[serde(rename = "PLANNING")]
    Planning,
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "ARCHIVED")]
    Archived,
}

impl std::fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Planning => write!(f, "planning"),
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

/// Methodological design of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperimentType {
    /// No imposed conditions; correlate what was logged anyway.
    #[serde(rename = "OBSERVATIONAL")]
    Observational,
    /// Conditions assigned by block randomization, subject aware.
    #[serde(rename = "RANDOMIZED")]
    Randomized,
    /// Randomized with the condition hidden from the subject.
    #[serde(rename = "BLIND_RCT")]
    BlindRct,
}

impl std::fmt::Display for ExperimentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Observational => write!(f, "observational"),
            Self::Randomized => write!(f, "randomized"),
            Self::BlindRct => write!(f, "blind_rct"),
        }
    }
}

/// One named experimental condition (e.g. "400mg magnesium" vs "placebo").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Condition {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            dose: None,
            description: None,
        }
    }
}

/// An N-of-1 experiment pairing an independent habit with a dependent one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub id: String,
    pub user_id: String,
    /// Habit whose conditions the scheduler assigns.
    pub independent_id: String,
    /// Habit whose outcome is measured against the conditions.
    pub dependent_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hypothesis: Option<String>,
    /// Set once, at the transition to ACTIVE. While set, `hypothesis` is
    /// immutable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hypothesis_locked_at: Option<DateTime<Utc>>,
    pub status: ExperimentStatus,
    #[serde(rename = "type")]
    pub experiment_type: ExperimentType,
    pub is_blind: bool,
    /// Days discarded from comparative analysis after a condition switch.
    pub washout_period: u32,
    /// Length of each randomization block; must be a multiple of the
    /// condition count.
    pub block_size: u32,
    pub conditions: Vec<Condition>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Experiment {
    /// Check the construction-time invariants. All must hold before the
    /// experiment may go ACTIVE.
    pub fn validate(&self) -> Result<(), ExperimentError> {
        if self.independent_id == self.dependent_id {
            return Err(ExperimentError::SelfComparison);
        }
        let k = self.conditions.len();
        if !(2..=8).contains(&k) {
            return Err(ExperimentError::ConditionCount(k));
        }
        if self.block_size == 0 || self.block_size as usize % k != 0 {
            return Err(ExperimentError::BlockSizeMismatch {
                block_size: self.block_size,
                conditions: k,
            });
        }
        if self.end_date <= self.start_date {
            return Err(ExperimentError::DateOrder);
        }
        let days = (self.end_date - self.start_date).num_days();
        if days < 7 {
            return Err(ExperimentError::TooShort { days });
        }
        Ok(())
    }

    /// Transition PLANNING → ACTIVE, stamping the pre-registration lock.
    ///
    /// Validation runs first; an invalid configuration never activates.
    pub fn activate(&mut self, now: DateTime<Utc>) -> Result<(), ExperimentError> {
        if self.status != ExperimentStatus::Planning {
            return Err(ExperimentError::InvalidTransition { from: self.status });
        }
        self.validate()?;
        self.status = ExperimentStatus::Active;
        self.hypothesis_locked_at = Some(now);
        Ok(())
    }

    /// Write the hypothesis.
    ///
    /// Once the lock is stamped, a write that would change the stored value
    /// fails with [`ExperimentError::HypothesisLocked`]. Re-writing the
    /// identical value is allowed — full-record updates from callers would
    /// otherwise trip over their own unchanged field.
    pub fn set_hypothesis(&mut self, hypothesis: Option<String>) -> Result<(), ExperimentError> {
        if self.hypothesis_locked_at.is_some() && self.hypothesis != hypothesis {
            return Err(ExperimentError::HypothesisLocked);
        }
        self.hypothesis = hypothesis;
        Ok(())
    }

    /// Condition labels in declaration order.
    pub fn condition_labels(&self) -> Vec<&str> {
        self.conditions.iter().map(|c| c.label.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_experiment() -> Experiment {
        Experiment {
            id: "exp1".into(),
            user_id: "u1".into(),
            independent_id: "h_magnesium".into(),
            dependent_id: "h_sleep".into(),
            name: "Magnesium and sleep".into(),
            hypothesis: Some("400mg magnesium improves sleep quality".into()),
            hypothesis_locked_at: None,
            status: ExperimentStatus::Planning,
            experiment_type: ExperimentType::BlindRct,
            is_blind: true,
            washout_period: 1,
            block_size: 4,
            conditions: vec![Condition::new("magnesium"), Condition::new("placebo")],
            start_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 29).unwrap(),
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(base_experiment().validate().is_ok());
    }

    #[test]
    fn test_validate_block_size_mismatch() {
        let mut e = base_experiment();
        e.block_size = 5;
        assert_eq!(
            e.validate(),
            Err(ExperimentError::BlockSizeMismatch {
                block_size: 5,
                conditions: 2
            })
        );
    }

    #[test]
    fn test_validate_zero_block_size() {
        let mut e = base_experiment();
        e.block_size = 0;
        assert!(matches!(
            e.validate(),
            Err(ExperimentError::BlockSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_condition_count() {
        let mut e = base_experiment();
        e.conditions = vec![Condition::new("only")];
        assert_eq!(e.validate(), Err(ExperimentError::ConditionCount(1)));

        e.conditions = (0..9).map(|i| Condition::new(format!("c{i}"))).collect();
        // 9 conditions also breaks the block multiple, so check the count
        // invariant fires first.
        assert_eq!(e.validate(), Err(ExperimentError::ConditionCount(9)));
    }

    #[test]
    fn test_validate_date_order() {
        let mut e = base_experiment();
        e.end_date = e.start_date;
        assert_eq!(e.validate(), Err(ExperimentError::DateOrder));
    }

    #[test]
    fn test_validate_too_short() {
        let mut e = base_experiment();
        e.end_date = e.start_date + chrono::Duration::days(5);
        assert_eq!(e.validate(), Err(ExperimentError::TooShort { days: 5 }));
    }

    #[test]
    fn test_validate_self_comparison() {
        let mut e = base_experiment();
        e.dependent_id = e.independent_id.clone();
        assert_eq!(e.validate(), Err(ExperimentError::SelfComparison));
    }

    #[test]
    fn test_activate_locks_hypothesis() {
        let mut e = base_experiment();
        let now = Utc::now();
        e.activate(now).unwrap();
        assert_eq!(e.status, ExperimentStatus::Active);
        assert_eq!(e.hypothesis_locked_at, Some(now));
    }

    #[test]
    fn test_activate_rejects_invalid_config() {
        let mut e = base_experiment();
        e.block_size = 3;
        assert!(e.activate(Utc::now()).is_err());
        assert_eq!(e.status, ExperimentStatus::Planning);
        assert!(e.hypothesis_locked_at.is_none());
    }

    #[test]
    fn test_activate_twice_rejected() {
        let mut e = base_experiment();
        e.activate(Utc::now()).unwrap();
        assert_eq!(
            e.activate(Utc::now()),
            Err(ExperimentError::InvalidTransition {
                from: ExperimentStatus::Active
            })
        );
    }

    #[test]
    fn test_hypothesis_mutable_before_lock() {
        let mut e = base_experiment();
        e.set_hypothesis(Some("something else".into())).unwrap();
        assert_eq!(e.hypothesis.as_deref(), Some("something else"));
    }

    #[test]
    fn test_hypothesis_locked_rejects_change() {
        let mut e = base_experiment();
        e.activate(Utc::now()).unwrap();
        let err = e.set_hypothesis(Some("revised after seeing data".into()));
        assert_eq!(err, Err(ExperimentError::HypothesisLocked));
        assert_eq!(
            e.hypothesis.as_deref(),
            Some("400mg magnesium improves sleep quality")
        );
    }

    #[test]
    fn test_hypothesis_locked_allows_identical_write() {
        let mut e = base_experiment();
        let original = e.hypothesis.clone();
        e.activate(Utc::now()).unwrap();
        assert!(e.set_hypothesis(original).is_ok());
    }

    #[test]
    fn test_wire_shape() {
        let e = base_experiment();
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "BLIND_RCT");
        assert_eq!(json["status"], "PLANNING");
        assert_eq!(json["isBlind"], true);
        assert_eq!(json["washoutPeriod"], 1);
        assert_eq!(json["blockSize"], 4);
        assert_eq!(json["independentId"], "h_magnesium");
        assert_eq!(json["conditions"][1]["label"], "placebo");
    }
}
