//! Garden domain: habit dimensions, plants, streaks, and the update engine.
//!
//! Each user owns two plants per habit dimension. Trend verdicts from the
//! classifier feed the [`engine::GardenEngine`], which decides how streaks,
//! plant health, plant age, and plant polarity change in one update cycle.
//! [`service::GardenService`] wires the engine to the classifier and store.

pub mod engine;
pub mod habits;
pub mod retry;
pub mod service;
pub mod species;
pub mod streak;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use engine::{AttritionStrategy, GardenEngine, GardenState, Mutation};
pub use habits::{DimensionInput, HabitSnapshot, HabitSubmission, InitialHabits, TrendHistory};
pub use service::{GardenService, GardenView, InitiateReport, UpdateReport};

/// Lowest value a plant's health or age can take.
pub const MIN_LEVEL: i64 = 0;

/// Highest value a plant's health or age can take.
pub const MAX_LEVEL: i64 = 10;

/// Clamp a health or age value into `[MIN_LEVEL, MAX_LEVEL]`.
pub fn clamp_level(value: i64) -> i64 {
    value.clamp(MIN_LEVEL, MAX_LEVEL)
}

// ==================== Dimension ====================

/// An independent habit axis with its own plant pair and streak counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Food,
    Health,
    Toxic,
}

impl Dimension {
    /// Every dimension, in the order cycles process them.
    pub const ALL: [Dimension; 3] = [Dimension::Food, Dimension::Health, Dimension::Toxic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Health => "health",
            Self::Toxic => "toxic",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "food" => Ok(Self::Food),
            "health" => Ok(Self::Health),
            "toxic" => Ok(Self::Toxic),
            _ => Err(format!(
                "invalid dimension '{}', expected 'food', 'health', or 'toxic'",
                s
            )),
        }
    }
}

// ==================== Polarity ====================

/// Which side of a dimension a plant represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Good,
    Bad,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Bad => "bad",
        }
    }

    /// The opposite polarity.
    pub fn flipped(self) -> Self {
        match self {
            Self::Good => Self::Bad,
            Self::Bad => Self::Good,
        }
    }
}

impl std::fmt::Display for Polarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Polarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "good" => Ok(Self::Good),
            "bad" => Ok(Self::Bad),
            _ => Err(format!("invalid polarity '{}', expected 'good' or 'bad'", s)),
        }
    }
}

// ==================== Verdict ====================

/// Trend direction reported by the classifier for one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Progress,
    Degrade,
    Constant,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Degrade => "degrade",
            Self::Constant => "constant",
        }
    }

    /// Streak delta contributed by this verdict.
    pub fn streak_delta(self) -> i64 {
        match self {
            Self::Progress => 1,
            Self::Degrade => -1,
            Self::Constant => 0,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "progress" => Ok(Self::Progress),
            "degrade" => Ok(Self::Degrade),
            "constant" => Ok(Self::Constant),
            _ => Err(format!(
                "invalid verdict '{}', expected 'progress', 'degrade', or 'constant'",
                s
            )),
        }
    }
}

// ==================== Per-dimension values ====================

/// One value per habit dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PerDimension<T> {
    pub food: T,
    pub health: T,
    pub toxic: T,
}

impl<T> PerDimension<T> {
    /// Build a value for every dimension from a closure.
    pub fn from_fn(mut f: impl FnMut(Dimension) -> T) -> Self {
        Self {
            food: f(Dimension::Food),
            health: f(Dimension::Health),
            toxic: f(Dimension::Toxic),
        }
    }

    pub fn get(&self, dimension: Dimension) -> &T {
        match dimension {
            Dimension::Food => &self.food,
            Dimension::Health => &self.health,
            Dimension::Toxic => &self.toxic,
        }
    }

    pub fn get_mut(&mut self, dimension: Dimension) -> &mut T {
        match dimension {
            Dimension::Food => &mut self.food,
            Dimension::Health => &mut self.health,
            Dimension::Toxic => &mut self.toxic,
        }
    }

    /// Iterate `(dimension, value)` pairs in [`Dimension::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Dimension, &T)> {
        Dimension::ALL.into_iter().map(move |d| (d, self.get(d)))
    }

    pub fn map<U>(&self, mut f: impl FnMut(Dimension, &T) -> U) -> PerDimension<U> {
        PerDimension::from_fn(|d| f(d, self.get(d)))
    }
}

/// Per-user streak counters (signed; positive means progress momentum).
pub type StreakCounters = PerDimension<i64>;

/// Classifier verdicts for every dimension.
pub type Verdicts = PerDimension<Verdict>;

// ==================== Plant ====================

/// Which member of a dimension's initiating pair a plant is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

impl std::str::FromStr for Slot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" | "a" => Ok(Self::A),
            "B" | "b" => Ok(Self::B),
            _ => Err(format!("invalid plant slot '{}', expected 'A' or 'B'", s)),
        }
    }
}

/// A plant in a user's garden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plant {
    pub id: Uuid,
    pub user_id: String,
    pub dimension: Dimension,
    pub slot: Slot,
    pub polarity: Polarity,
    /// Cosmetic species tag, redrawn whenever the polarity is assigned.
    pub species: String,
    pub health: i64,
    pub age: i64,
}

impl Plant {
    pub fn matches(&self, dimension: Dimension, polarity: Polarity) -> bool {
        self.dimension == dimension && self.polarity == polarity
    }
}
