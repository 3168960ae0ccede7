//! Habit snapshots submitted by users and the stored trend history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;
use crate::garden::{Dimension, PerDimension};

/// Marker a submission uses to say "same as last time" for a dimension.
pub const UNCHANGED_MARKER: &str = "unchanged";

/// Maximum number of entries in one habit list.
pub const MAX_ENTRIES: usize = 50;

/// Maximum length (in characters) of one habit entry.
pub const MAX_ENTRY_LEN: usize = 200;

/// The latest known habit lists, one per dimension.
pub type HabitSnapshot = PerDimension<Vec<String>>;

/// Habits submitted when a garden is first planted. Every list is required,
/// though any of them may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InitialHabits {
    /// Foods eaten regularly.
    pub regular: Vec<String>,
    /// Foods eaten occasionally.
    pub occasional: Vec<String>,
    /// Current health issues.
    pub health: Vec<String>,
    /// Toxin use (smoking, alcohol, ...).
    pub toxic: Vec<String>,
}

impl InitialHabits {
    /// Snapshot seeded into trend history: regular foods followed by
    /// occasional foods make up the food dimension.
    pub fn to_snapshot(&self) -> HabitSnapshot {
        HabitSnapshot {
            food: self
                .regular
                .iter()
                .chain(self.occasional.iter())
                .cloned()
                .collect(),
            health: self.health.clone(),
            toxic: self.toxic.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_entries("regular", &self.regular)?;
        validate_entries("occasional", &self.occasional)?;
        validate_entries("health", &self.health)?;
        validate_entries("toxic", &self.toxic)
    }
}

/// One dimension of an update submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimensionInput {
    /// Keep the previously stored habits for this dimension.
    Unchanged,
    Habits(Vec<String>),
    /// A bare string other than the unchanged marker. Rejected by `validate`.
    Unrecognized(String),
}

impl Serialize for DimensionInput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unchanged => serializer.serialize_str(UNCHANGED_MARKER),
            Self::Habits(list) => list.serialize(serializer),
            Self::Unrecognized(text) => serializer.serialize_str(text),
        }
    }
}

impl<'de> Deserialize<'de> for DimensionInput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            List(Vec<String>),
            Marker(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::List(list) => Self::Habits(list),
            Raw::Marker(text) if text.trim().eq_ignore_ascii_case(UNCHANGED_MARKER) => {
                Self::Unchanged
            }
            Raw::Marker(text) => Self::Unrecognized(text),
        })
    }
}

/// Habits submitted for an update cycle.
pub type HabitSubmission = PerDimension<DimensionInput>;

impl HabitSubmission {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (dimension, input) in self.iter() {
            match input {
                DimensionInput::Unchanged => {}
                DimensionInput::Habits(list) => validate_entries(dimension.as_str(), list)?,
                DimensionInput::Unrecognized(text) => {
                    return Err(ValidationError::InvalidField {
                        field: dimension.to_string(),
                        reason: format!(
                            "expected a list of habits or \"{UNCHANGED_MARKER}\", got \"{text}\""
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// The snapshot the classifier compares against `previous`: unchanged
    /// dimensions carry the previous habits forward.
    pub fn resolve(&self, previous: &HabitSnapshot) -> HabitSnapshot {
        HabitSnapshot::from_fn(|dimension| match self.get(dimension) {
            DimensionInput::Habits(list) => list.clone(),
            DimensionInput::Unchanged | DimensionInput::Unrecognized(_) => {
                previous.get(dimension).clone()
            }
        })
    }

    /// Per-dimension history overwrite; `None` keeps the stored value.
    pub fn history_update(&self) -> HistoryUpdate {
        HistoryUpdate::from_fn(|dimension| match self.get(dimension) {
            DimensionInput::Habits(list) => Some(list.clone()),
            DimensionInput::Unchanged | DimensionInput::Unrecognized(_) => None,
        })
    }
}

/// Trend history overwrite with a per-dimension skip (`None`).
pub type HistoryUpdate = PerDimension<Option<Vec<String>>>;

/// Stored "previous" side of the next diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendHistory {
    pub snapshot: HabitSnapshot,
    /// Habits the garden was planted with, passed to the classifier as context.
    pub baseline: Option<InitialHabits>,
    /// Bumped by every committed update cycle.
    pub revision: i64,
    pub updated_at: DateTime<Utc>,
}

fn validate_entries(field: &str, entries: &[String]) -> Result<(), ValidationError> {
    if entries.len() > MAX_ENTRIES {
        return Err(ValidationError::InvalidField {
            field: field.to_string(),
            reason: format!("at most {MAX_ENTRIES} entries allowed, got {}", entries.len()),
        });
    }
    for entry in entries {
        if entry.trim().is_empty() {
            return Err(ValidationError::InvalidField {
                field: field.to_string(),
                reason: "entries must not be blank".to_string(),
            });
        }
        if entry.chars().count() > MAX_ENTRY_LEN {
            return Err(ValidationError::InvalidField {
                field: field.to_string(),
                reason: format!("entries must be at most {MAX_ENTRY_LEN} characters"),
            });
        }
    }
    Ok(())
}

/// Render a dimension's habits for prompts and logs.
pub fn describe(dimension: Dimension, habits: &HabitSnapshot) -> String {
    let list = habits.get(dimension);
    if list.is_empty() {
        "(none)".to_string()
    } else {
        list.join(", ")
    }
}
