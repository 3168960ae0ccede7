//! The garden update engine.
//!
//! Pure decision logic for one update cycle. Given the user's current plants
//! and streak counters plus the classifier's verdicts, the engine mutates an
//! in-memory [`GardenState`] and returns the ordered list of [`Mutation`]s it
//! applied so the service can replay them against the store inside a single
//! transaction.
//!
//! Steps run in a fixed order, each reading the output of the previous one:
//!
//! 1. streak update
//! 2. threshold shifts (health transfer between a dimension's plants)
//! 3. attrition, when a strategy is enabled
//! 4. growth (reads post-shift health)
//! 5. transformation (reads post-adjustment health)

use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::garden::streak::{self, THRESHOLD};
use crate::garden::{
    Dimension, MAX_LEVEL, PerDimension, Plant, Polarity, StreakCounters, Verdict, Verdicts,
    clamp_level, species,
};

/// Plants with health strictly above this value can grow.
pub const GROWTH_HEALTH_FLOOR: i64 = 5;

/// Plants with health below this value transform.
pub const COLLAPSE_HEALTH: i64 = 1;

/// Health a plant restarts with after transforming.
pub const TRANSFORM_HEALTH: i64 = 6;

/// Age a plant restarts with after transforming.
pub const TRANSFORM_AGE: i64 = 1;

/// How a dimension with no habit change decays over several cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttritionStrategy {
    /// Only threshold shifts change health.
    #[default]
    Disabled,
    /// Inspect the last `window` verdicts of a dimension (current cycle
    /// included). No "degrade" among them costs the Bad plant one health; no
    /// "progress" among them costs the Good plant one health.
    ThresholdAbsence { window: usize },
}

impl AttritionStrategy {
    /// Number of stored verdicts (excluding the current cycle) the engine
    /// needs to evaluate this strategy.
    pub fn lookback(&self) -> usize {
        match self {
            Self::Disabled => 0,
            Self::ThresholdAbsence { window } => window.saturating_sub(1),
        }
    }
}

/// Why a health adjustment happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustCause {
    Threshold,
    Attrition,
}

/// One state change, in the order the engine applied it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    /// Streak counters moved by these deltas.
    StreakDelta { deltas: PerDimension<i64> },
    /// This cycle's verdict was appended to the status log.
    RecordStatus { dimension: Dimension, verdict: Verdict },
    /// A counter crossed the threshold and went back to zero.
    ResetStreak { dimension: Dimension },
    /// Every plant matching (dimension, polarity) had its health moved by
    /// `delta`, clamped to the valid range.
    AdjustHealth {
        dimension: Dimension,
        polarity: Polarity,
        delta: i64,
        cause: AdjustCause,
    },
    /// Every plant matching (dimension, polarity) with health above the
    /// growth floor and age below the maximum aged by one.
    Grow {
        dimension: Dimension,
        polarity: Polarity,
    },
    /// A collapsed plant flipped polarity and restarted.
    Transform {
        plant_id: Uuid,
        dimension: Dimension,
        from: Polarity,
        to: Polarity,
        species: String,
    },
}

/// A user's garden as the engine sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GardenState {
    pub plants: Vec<Plant>,
    pub streaks: StreakCounters,
}

/// Stateless rule set for update cycles.
#[derive(Debug, Clone, Copy, Default)]
pub struct GardenEngine {
    attrition: AttritionStrategy,
}

impl GardenEngine {
    pub fn new(attrition: AttritionStrategy) -> Self {
        Self { attrition }
    }

    pub fn attrition(&self) -> AttritionStrategy {
        self.attrition
    }

    /// Run one update cycle.
    ///
    /// `recent_status` holds, per dimension, the most recent stored verdicts
    /// (newest first) from earlier cycles; it is only read when attrition is
    /// enabled.
    pub fn run_cycle<R: Rng + ?Sized>(
        &self,
        state: &mut GardenState,
        verdicts: &Verdicts,
        recent_status: &PerDimension<Vec<Verdict>>,
        rng: &mut R,
    ) -> Vec<Mutation> {
        let mut mutations = Vec::new();

        let deltas = streak::apply(&mut state.streaks, verdicts);
        mutations.push(Mutation::StreakDelta { deltas });
        for (dimension, verdict) in verdicts.iter() {
            mutations.push(Mutation::RecordStatus {
                dimension,
                verdict: *verdict,
            });
        }

        apply_thresholds(state, &mut mutations);

        if let AttritionStrategy::ThresholdAbsence { window } = self.attrition {
            apply_attrition(state, verdicts, recent_status, window, &mut mutations);
        }

        grow(&mut state.plants, &mut mutations);
        transform_collapsed(&mut state.plants, rng, &mut mutations);

        tracing::debug!(
            mutations = mutations.len(),
            streaks = ?state.streaks,
            "garden cycle evaluated"
        );

        mutations
    }
}

/// Move health by `delta` on every plant matching (dimension, polarity).
///
/// Returns how many plants matched.
pub fn adjust_health(
    plants: &mut [Plant],
    dimension: Dimension,
    polarity: Polarity,
    delta: i64,
) -> usize {
    let mut matched = 0;
    for plant in plants.iter_mut().filter(|p| p.matches(dimension, polarity)) {
        plant.health = clamp_level(plant.health + delta);
        matched += 1;
    }
    matched
}

fn push_adjustment(
    plants: &mut [Plant],
    dimension: Dimension,
    polarity: Polarity,
    delta: i64,
    cause: AdjustCause,
    mutations: &mut Vec<Mutation>,
) {
    if adjust_health(plants, dimension, polarity, delta) > 0 {
        mutations.push(Mutation::AdjustHealth {
            dimension,
            polarity,
            delta,
            cause,
        });
    }
}

fn apply_thresholds(state: &mut GardenState, mutations: &mut Vec<Mutation>) {
    for dimension in Dimension::ALL {
        let value = *state.streaks.get(dimension);
        let Some(winner) = streak::crossed(value) else {
            continue;
        };

        tracing::debug!(
            %dimension,
            streak = value,
            threshold = THRESHOLD,
            %winner,
            "threshold crossed"
        );

        push_adjustment(
            &mut state.plants,
            dimension,
            winner,
            1,
            AdjustCause::Threshold,
            mutations,
        );
        push_adjustment(
            &mut state.plants,
            dimension,
            winner.flipped(),
            -1,
            AdjustCause::Threshold,
            mutations,
        );

        streak::reset(&mut state.streaks, dimension);
        mutations.push(Mutation::ResetStreak { dimension });
    }
}

fn apply_attrition(
    state: &mut GardenState,
    verdicts: &Verdicts,
    recent_status: &PerDimension<Vec<Verdict>>,
    window: usize,
    mutations: &mut Vec<Mutation>,
) {
    if window == 0 {
        return;
    }

    for dimension in Dimension::ALL {
        let history: Vec<Verdict> = std::iter::once(*verdicts.get(dimension))
            .chain(recent_status.get(dimension).iter().copied())
            .take(window)
            .collect();

        if history.len() < window {
            continue;
        }

        if !history.contains(&Verdict::Degrade) {
            push_adjustment(
                &mut state.plants,
                dimension,
                Polarity::Bad,
                -1,
                AdjustCause::Attrition,
                mutations,
            );
        }
        if !history.contains(&Verdict::Progress) {
            push_adjustment(
                &mut state.plants,
                dimension,
                Polarity::Good,
                -1,
                AdjustCause::Attrition,
                mutations,
            );
        }
    }
}

/// Whether a plant qualifies for growth this cycle.
pub fn can_grow(plant: &Plant) -> bool {
    plant.health > GROWTH_HEALTH_FLOOR && plant.age < MAX_LEVEL
}

fn grow(plants: &mut [Plant], mutations: &mut Vec<Mutation>) {
    for dimension in Dimension::ALL {
        for polarity in [Polarity::Good, Polarity::Bad] {
            let mut grew = false;
            for plant in plants
                .iter_mut()
                .filter(|p| p.matches(dimension, polarity) && can_grow(p))
            {
                plant.age = clamp_level(plant.age + 1);
                grew = true;
            }
            if grew {
                mutations.push(Mutation::Grow {
                    dimension,
                    polarity,
                });
            }
        }
    }
}

fn transform_collapsed<R: Rng + ?Sized>(
    plants: &mut [Plant],
    rng: &mut R,
    mutations: &mut Vec<Mutation>,
) {
    let collapsed: Vec<usize> = plants
        .iter()
        .enumerate()
        .filter(|(_, p)| p.health < COLLAPSE_HEALTH)
        .map(|(i, _)| i)
        .collect();

    for index in collapsed {
        let plant = &mut plants[index];
        let from = plant.polarity;
        let to = from.flipped();
        let species = species::draw(to, rng).to_string();

        plant.polarity = to;
        plant.health = TRANSFORM_HEALTH;
        plant.age = TRANSFORM_AGE;
        plant.species = species.clone();

        tracing::debug!(
            plant_id = %plant.id,
            dimension = %plant.dimension,
            %from,
            %to,
            "plant transformed"
        );

        mutations.push(Mutation::Transform {
            plant_id: plant.id,
            dimension: plant.dimension,
            from,
            to,
            species,
        });
    }
}
