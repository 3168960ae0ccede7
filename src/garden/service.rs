//! Garden orchestration: validation, classifier call policy, engine, and
//! transactional persistence.

use std::collections::HashMap;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use uuid::Uuid;

use crate::classifier::{Classified, Confidence, HabitClassifier, InitialAssessment, TrendRequest};
use crate::config::ClassifierConfig;
use crate::db::{GardenStore, GardenTransaction};
use crate::error::{ClassifierError, DatabaseError, GardenError};
use crate::garden::engine::{GardenEngine, GardenState, Mutation};
use crate::garden::retry::call_with_policy;
use crate::garden::{
    Dimension, HabitSubmission, InitialHabits, MAX_LEVEL, MIN_LEVEL, PerDimension, Plant, Slot,
    StreakCounters, Verdict, Verdicts, clamp_level, species,
};

/// A user's garden as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GardenView {
    pub plants: Vec<Plant>,
    pub streaks: Option<StreakCounters>,
}

/// Outcome of planting a new garden.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitiateReport {
    pub plants: Vec<Plant>,
    pub streaks: StreakCounters,
    pub confidence: Confidence,
}

/// Outcome of one update cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateReport {
    pub plants: Vec<Plant>,
    pub streaks: StreakCounters,
    pub verdicts: Verdicts,
    pub confidence: Confidence,
    /// Every state change the cycle applied, in order.
    pub mutations: Vec<Mutation>,
}

/// Update cycles rerun at most this many times when another writer commits
/// first.
const MAX_CYCLE_ATTEMPTS: u32 = 3;

/// Runs garden operations for all users.
///
/// Operations on the same user are serialized in-process by a per-user lock
/// and across processes by the trend history revision, which each cycle
/// claims inside its write transaction.
pub struct GardenService {
    store: Arc<dyn GardenStore>,
    classifier: Arc<dyn HabitClassifier>,
    engine: GardenEngine,
    policy: ClassifierConfig,
    locks: std::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    rng: std::sync::Mutex<StdRng>,
}

impl GardenService {
    pub fn new(
        store: Arc<dyn GardenStore>,
        classifier: Arc<dyn HabitClassifier>,
        engine: GardenEngine,
        policy: ClassifierConfig,
    ) -> Self {
        Self::with_rng(store, classifier, engine, policy, StdRng::from_entropy())
    }

    /// Like [`new`](Self::new) but with reproducible species draws.
    pub fn with_seed(
        store: Arc<dyn GardenStore>,
        classifier: Arc<dyn HabitClassifier>,
        engine: GardenEngine,
        policy: ClassifierConfig,
        seed: u64,
    ) -> Self {
        Self::with_rng(store, classifier, engine, policy, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        store: Arc<dyn GardenStore>,
        classifier: Arc<dyn HabitClassifier>,
        engine: GardenEngine,
        policy: ClassifierConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            store,
            classifier,
            engine,
            policy,
            locks: std::sync::Mutex::new(HashMap::new()),
            rng: std::sync::Mutex::new(rng),
        }
    }

    /// Current plants and streaks. An unknown user gets an empty garden.
    pub async fn garden(&self, user_id: &str) -> Result<GardenView, GardenError> {
        let plants = self.store.list_plants(user_id).await?;
        let streaks = self.store.get_streaks(user_id).await?;
        Ok(GardenView { plants, streaks })
    }

    /// Plant a new garden from the user's initial habits.
    pub async fn initiate(
        &self,
        user_id: &str,
        habits: &InitialHabits,
    ) -> Result<InitiateReport, GardenError> {
        habits.validate()?;

        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        if self.store.get_streaks(user_id).await?.is_some()
            || !self.store.list_plants(user_id).await?.is_empty()
        {
            return Err(GardenError::AlreadyExists {
                user_id: user_id.to_string(),
            });
        }

        let classified = call_with_policy(&self.policy, "initiate", || {
            self.classifier.initiate(habits)
        })
        .await?;
        let (assessment, confidence) = self.accept(classified, "initiate")?;

        let plants = self.seed_plants(user_id, &assessment);

        let mut tx = self.store.begin(user_id).await?;
        if let Err(err) = write_garden(tx.as_mut(), &plants, habits).await {
            abort(tx, user_id).await;
            return Err(match err {
                DatabaseError::Constraint(_) => GardenError::AlreadyExists {
                    user_id: user_id.to_string(),
                },
                other => other.into(),
            });
        }
        tx.commit().await?;

        tracing::info!(user_id, ?confidence, "garden planted");

        Ok(InitiateReport {
            plants,
            streaks: StreakCounters::default(),
            confidence,
        })
    }

    /// Run one update cycle for a habit submission.
    pub async fn update(
        &self,
        user_id: &str,
        submission: &HabitSubmission,
    ) -> Result<UpdateReport, GardenError> {
        submission.validate()?;

        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let mut attempt = 1;
        loop {
            match self.run_update(user_id, submission).await {
                Err(GardenError::Database(DatabaseError::Conflict { .. }))
                    if attempt < MAX_CYCLE_ATTEMPTS =>
                {
                    tracing::warn!(
                        user_id,
                        attempt,
                        "garden changed by another writer, rerunning cycle"
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// One read, classify, decide, write pass against the current revision.
    async fn run_update(
        &self,
        user_id: &str,
        submission: &HabitSubmission,
    ) -> Result<UpdateReport, GardenError> {
        let not_initialized = || GardenError::NotInitialized {
            user_id: user_id.to_string(),
        };
        // History first: any commit after this read bumps the revision and
        // fails the write below.
        let history = self
            .store
            .get_history(user_id)
            .await?
            .ok_or_else(not_initialized)?;
        let streaks = self
            .store
            .get_streaks(user_id)
            .await?
            .ok_or_else(not_initialized)?;
        let plants = self.store.list_plants(user_id).await?;

        let revision = history.revision;
        let request = TrendRequest {
            current: submission.resolve(&history.snapshot),
            previous: history.snapshot,
            baseline: history.baseline,
        };
        let classified = call_with_policy(&self.policy, "classify", || {
            self.classifier.classify(&request)
        })
        .await?;
        let (verdicts, confidence) = self.accept(classified, "classify")?;

        let recent = self.recent_status(user_id).await?;

        let mut state = GardenState { plants, streaks };
        let mutations = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            self.engine.run_cycle(&mut state, &verdicts, &recent, &mut *rng)
        };

        let mut tx = self.store.begin(user_id).await?;
        if let Err(err) = write_cycle(tx.as_mut(), &mutations, submission, revision).await {
            abort(tx, user_id).await;
            return Err(err.into());
        }
        tx.commit().await?;

        tracing::info!(
            user_id,
            food = %verdicts.food,
            health = %verdicts.health,
            toxic = %verdicts.toxic,
            mutations = mutations.len(),
            "garden updated"
        );

        Ok(UpdateReport {
            plants: state.plants,
            streaks: state.streaks,
            verdicts,
            confidence,
            mutations,
        })
    }

    fn user_lock(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(user_id.to_string()).or_default().clone()
    }

    /// Apply the recovered-output policy to a classifier result.
    fn accept<T>(
        &self,
        classified: Classified<T>,
        operation: &str,
    ) -> Result<(T, Confidence), ClassifierError> {
        let confidence = classified.confidence();
        match classified {
            Classified::Structured(value) => Ok((value, confidence)),
            Classified::Recovered(value) if self.policy.accept_recovered => {
                tracing::warn!(operation, "using classifier output recovered from free text");
                Ok((value, confidence))
            }
            Classified::Recovered(_) => {
                tracing::error!(operation, "rejecting classifier output recovered from free text");
                Err(ClassifierError::RecoveredRejected)
            }
        }
    }

    async fn recent_status(
        &self,
        user_id: &str,
    ) -> Result<PerDimension<Vec<Verdict>>, DatabaseError> {
        let lookback = self.engine.attrition().lookback();
        let mut recent = PerDimension::<Vec<Verdict>>::default();
        if lookback == 0 {
            return Ok(recent);
        }
        for dimension in Dimension::ALL {
            *recent.get_mut(dimension) = self
                .store
                .recent_status(user_id, dimension, lookback)
                .await?;
        }
        Ok(recent)
    }

    fn seed_plants(&self, user_id: &str, assessment: &InitialAssessment) -> Vec<Plant> {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let mut plants = Vec::with_capacity(6);
        for (dimension, seed) in assessment.iter() {
            for (slot, polarity) in [(Slot::A, seed.polarity_a), (Slot::B, seed.polarity_b)] {
                plants.push(Plant {
                    id: Uuid::new_v4(),
                    user_id: user_id.to_string(),
                    dimension,
                    slot,
                    polarity,
                    species: species::draw(polarity, &mut *rng).to_string(),
                    health: clamp_level(seed.health),
                    age: clamp_level(seed.age),
                });
            }
        }
        plants
    }
}

async fn write_garden(
    tx: &mut dyn GardenTransaction,
    plants: &[Plant],
    habits: &InitialHabits,
) -> Result<(), DatabaseError> {
    for plant in plants {
        tx.insert_plant(plant).await?;
    }
    tx.create_streaks().await?;
    tx.create_history(&habits.to_snapshot(), habits).await
}

async fn write_cycle(
    tx: &mut dyn GardenTransaction,
    mutations: &[Mutation],
    submission: &HabitSubmission,
    revision: i64,
) -> Result<(), DatabaseError> {
    // Claim the revision before replaying so a stale cycle writes nothing.
    tx.update_history(&submission.history_update(), revision).await?;
    replay(tx, mutations).await
}

/// Write the engine's mutations in the order they were decided.
async fn replay(
    tx: &mut dyn GardenTransaction,
    mutations: &[Mutation],
) -> Result<(), DatabaseError> {
    for mutation in mutations {
        match mutation {
            Mutation::StreakDelta { deltas } => tx.apply_streak_delta(deltas).await?,
            Mutation::RecordStatus { dimension, verdict } => {
                tx.append_status(*dimension, *verdict).await?
            }
            Mutation::ResetStreak { dimension } => tx.reset_streak(*dimension).await?,
            Mutation::AdjustHealth {
                dimension,
                polarity,
                delta,
                ..
            } => {
                tx.adjust_health(*dimension, *polarity, *delta, MIN_LEVEL, MAX_LEVEL)
                    .await?;
            }
            Mutation::Grow {
                dimension,
                polarity,
            } => {
                tx.increment_age(*dimension, *polarity).await?;
            }
            Mutation::Transform {
                plant_id,
                to,
                species,
                ..
            } => tx.transform(*plant_id, *to, species).await?,
        }
    }
    Ok(())
}

async fn abort(mut tx: Box<dyn GardenTransaction>, user_id: &str) {
    if let Err(err) = tx.rollback().await {
        tracing::warn!(user_id, error = %err, "rollback failed");
    }
}
