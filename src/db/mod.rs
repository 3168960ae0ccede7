//! Persistence for gardens.
//!
//! [`GardenStore`] covers reads and opens per-user write transactions;
//! every mutation of a cycle goes through one [`GardenTransaction`] so a
//! failed cycle leaves no partial state behind.

pub mod libsql;
pub mod libsql_migrations;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::DatabaseError;
use crate::garden::habits::HistoryUpdate;
use crate::garden::{
    Dimension, HabitSnapshot, InitialHabits, PerDimension, Plant, Polarity, StreakCounters,
    TrendHistory, Verdict,
};

pub use self::libsql::LibSqlBackend;

/// Open the configured backend: an embedded replica when a remote URL is
/// set, otherwise a local file.
pub async fn connect_from_config(config: &DatabaseConfig) -> Result<LibSqlBackend, DatabaseError> {
    match (&config.remote_url, &config.auth_token) {
        (Some(url), Some(token)) => {
            LibSqlBackend::new_remote_replica(&config.path, url, token.expose_secret()).await
        }
        _ => LibSqlBackend::new_local(&config.path).await,
    }
}

/// Read access to gardens plus transaction entry point.
#[async_trait]
pub trait GardenStore: Send + Sync {
    /// Apply the schema. Idempotent.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// All plants of a user, ordered by dimension then slot. Empty if none.
    async fn list_plants(&self, user_id: &str) -> Result<Vec<Plant>, DatabaseError>;

    async fn get_streaks(&self, user_id: &str) -> Result<Option<StreakCounters>, DatabaseError>;

    async fn get_history(&self, user_id: &str) -> Result<Option<TrendHistory>, DatabaseError>;

    /// The most recent `limit` verdicts for a dimension, newest first.
    async fn recent_status(
        &self,
        user_id: &str,
        dimension: Dimension,
        limit: usize,
    ) -> Result<Vec<Verdict>, DatabaseError>;

    /// Open a write transaction scoped to `user_id`.
    async fn begin(&self, user_id: &str) -> Result<Box<dyn GardenTransaction>, DatabaseError>;
}

/// Writes for one user inside a single database transaction.
///
/// Dropping without [`commit`](GardenTransaction::commit) rolls back.
#[async_trait]
pub trait GardenTransaction: Send {
    /// Insert a new plant. A second plant in the same (dimension, slot) is a
    /// [`DatabaseError::Constraint`].
    async fn insert_plant(&mut self, plant: &Plant) -> Result<(), DatabaseError>;

    /// Create the all-zero streak record.
    async fn create_streaks(&mut self) -> Result<(), DatabaseError>;

    /// Create the trend history from the initial snapshot.
    async fn create_history(
        &mut self,
        snapshot: &HabitSnapshot,
        baseline: &InitialHabits,
    ) -> Result<(), DatabaseError>;

    /// Add per-dimension deltas. [`DatabaseError::NotFound`] if the user has
    /// no streak record.
    async fn apply_streak_delta(&mut self, deltas: &PerDimension<i64>)
    -> Result<(), DatabaseError>;

    /// Set one counter to zero.
    async fn reset_streak(&mut self, dimension: Dimension) -> Result<(), DatabaseError>;

    async fn append_status(
        &mut self,
        dimension: Dimension,
        verdict: Verdict,
    ) -> Result<(), DatabaseError>;

    /// Move health of every matching plant by `delta`, clamped to
    /// `[floor, ceiling]`. Returns the number of plants touched.
    async fn adjust_health(
        &mut self,
        dimension: Dimension,
        polarity: Polarity,
        delta: i64,
        floor: i64,
        ceiling: i64,
    ) -> Result<u64, DatabaseError>;

    /// Age every matching plant that satisfies the growth predicate.
    async fn increment_age(
        &mut self,
        dimension: Dimension,
        polarity: Polarity,
    ) -> Result<u64, DatabaseError>;

    /// Flip a plant to `polarity` with fresh health, age, and species.
    async fn transform(
        &mut self,
        plant_id: Uuid,
        polarity: Polarity,
        species: &str,
    ) -> Result<(), DatabaseError>;

    /// Overwrite history dimensions that are `Some` and bump the revision.
    ///
    /// Succeeds only while the stored revision still equals
    /// `expected_revision`; otherwise another cycle committed first and the
    /// result is [`DatabaseError::Conflict`].
    async fn update_history(
        &mut self,
        update: &HistoryUpdate,
        expected_revision: i64,
    ) -> Result<(), DatabaseError>;

    async fn commit(&mut self) -> Result<(), DatabaseError>;

    async fn rollback(&mut self) -> Result<(), DatabaseError>;
}
