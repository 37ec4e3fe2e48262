//! Tracked-measurement data model.
//!
//! A habit owns named sub-variables (quantitative measurements); a habit
//! entry is one logging event on a logical calendar date carrying one numeric
//! observation per sub-variable. These are the read shapes the engine
//! consumes from the data-access collaborator — camelCase on the wire to
//! match the external JSON contracts.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Measurement type of a sub-variable.
///
/// The classification is fixed at creation: there is deliberately no mutation
/// API, because retyping a sub-variable after observations exist would
/// invalidate the statistical interpretation of its history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubvariableKind {
    /// Continuous numeric measurement (e.g. minutes, milligrams).
    #[serde(rename = "NUMERIC")]
    Numeric,
    /// 0–10 self-rating scale.
    #[serde(rename = "SCALE_0_10")]
    Scale0To10,
    /// Yes/no, recorded as {0, 1}.
    #[serde(rename = "BOOLEAN")]
    Boolean,
    /// Named category, recorded as an ordinal code.
    #[serde(rename = "CATEGORY")]
    Category,
}

impl SubvariableKind {
    /// Ordinal kinds get rank-based (Spearman) treatment in pairwise scans;
    /// continuous kinds get Pearson.
    pub fn is_ordinal(&self) -> bool {
        matches!(self, Self::Scale0To10 | Self::Boolean | Self::Category)
    }
}

impl std::fmt::Display for SubvariableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric => write!(f, "numeric"),
            Self::Scale0To10 => write!(f, "scale_0_10"),
            Self::Boolean => write!(f, "boolean"),
            Self::Category => write!(f, "category"),
        }
    }
}

/// A named numeric-producing measurement belonging to exactly one habit.
///
/// `habit_name` is denormalized by the data-access layer so insight text can
/// label results without a second lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subvariable {
    pub id: String,
    pub habit_id: String,
    pub habit_name: String,
    pub name: String,
    pub kind: SubvariableKind,
}

/// One numeric observation of a sub-variable within a logging event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubvariableEntry {
    pub subvariable_id: String,
    pub numeric_value: f64,
    /// Original user input before numeric mapping (e.g. a category label).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_value: Option<String>,
}

/// One logging event for a habit on a logical calendar date.
///
/// At most one observation per sub-variable per date; the store upserts with
/// last-write-wins when the same date is logged again.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitEntry {
    pub id: String,
    pub habit_id: String,
    pub user_id: String,
    /// Calendar day the observation belongs to (no time component).
    pub logical_date: NaiveDate,
    /// When the entry was actually recorded.
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub subvariable_entries: Vec<SubvariableEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinal_classification() {
        assert!(!SubvariableKind::Numeric.is_ordinal());
        assert!(SubvariableKind::Scale0To10.is_ordinal());
        assert!(SubvariableKind::Boolean.is_ordinal());
        assert!(SubvariableKind::Category.is_ordinal());
    }

    #[test]
    fn test_kind_wire_shape() {
        let json = serde_json::to_string(&SubvariableKind::Scale0To10).unwrap();
        assert_eq!(json, "\"SCALE_0_10\"");
        let back: SubvariableKind = serde_json::from_str("\"NUMERIC\"").unwrap();
        assert_eq!(back, SubvariableKind::Numeric);
    }

    #[test]
    fn test_habit_entry_wire_shape() {
        let entry = HabitEntry {
            id: "e1".into(),
            habit_id: "h1".into(),
            user_id: "u1".into(),
            logical_date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            timestamp: Utc::now(),
            note: None,
            subvariable_entries: vec![SubvariableEntry {
                subvariable_id: "sv1".into(),
                numeric_value: 7.0,
                raw_value: None,
            }],
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["habitId"], "h1");
        assert_eq!(json["logicalDate"], "2025-03-14");
        assert_eq!(json["subvariableEntries"][0]["subvariableId"], "sv1");
        assert!(json["subvariableEntries"][0].get("rawValue").is_none());
    }
}
