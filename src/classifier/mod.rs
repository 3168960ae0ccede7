//! Habit classification capability.
//!
//! The garden service depends on [`HabitClassifier`] only; the LLM-backed
//! implementation lives in [`llm`]. Results carry how they were obtained so
//! output scraped out of free text is never mistaken for a structured
//! function call.

pub mod llm;
pub mod recovery;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;
use crate::garden::{HabitSnapshot, InitialHabits, PerDimension, Polarity, Verdicts};

pub use llm::LlmClassifier;

/// How a classifier result was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// The model answered through the declared function call.
    Structured,
    /// JSON was recovered from a free-text answer.
    Recovered,
}

/// A classifier result tagged with its [`Confidence`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified<T> {
    Structured(T),
    Recovered(T),
}

impl<T> Classified<T> {
    pub fn confidence(&self) -> Confidence {
        match self {
            Self::Structured(_) => Confidence::Structured,
            Self::Recovered(_) => Confidence::Recovered,
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Structured(v) | Self::Recovered(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Self::Structured(v) | Self::Recovered(v) => v,
        }
    }

    /// Convert the payload, keeping the tag.
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Classified<U>, E> {
        Ok(match self {
            Self::Structured(v) => Classified::Structured(f(v)?),
            Self::Recovered(v) => Classified::Recovered(f(v)?),
        })
    }
}

/// Initial state for one dimension's plant pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantSeed {
    pub polarity_a: Polarity,
    pub polarity_b: Polarity,
    pub age: i64,
    pub health: i64,
}

/// Per-dimension plant seeds produced at initiation.
pub type InitialAssessment = PerDimension<PlantSeed>;

/// Input of a trend classification.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendRequest {
    pub previous: HabitSnapshot,
    pub current: HabitSnapshot,
    /// Habits the garden was planted with.
    pub baseline: Option<InitialHabits>,
}

/// External judgement of habits.
#[async_trait]
pub trait HabitClassifier: Send + Sync {
    /// Assess initial habits into per-dimension plant seeds.
    async fn initiate(
        &self,
        habits: &InitialHabits,
    ) -> Result<Classified<InitialAssessment>, ClassifierError>;

    /// Judge the trend from `previous` to `current` for every dimension.
    async fn classify(&self, request: &TrendRequest)
    -> Result<Classified<Verdicts>, ClassifierError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classified_keeps_tag_through_try_map() {
        let recovered: Classified<&str> = Classified::Recovered("3");
        let mapped = recovered
            .try_map(|s| s.parse::<i64>())
            .expect("parses");
        assert_eq!(mapped, Classified::Recovered(3));
        assert_eq!(mapped.confidence(), Confidence::Recovered);
        assert_eq!(*mapped.value(), 3);

        let structured: Classified<&str> = Classified::Structured("x");
        assert!(structured.try_map(|s| s.parse::<i64>()).is_err());
    }

    #[test]
    fn confidence_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(Confidence::Recovered).unwrap(),
            serde_json::json!("recovered")
        );
    }
}
