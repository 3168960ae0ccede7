//! Garden GardenStore implementation for LibSqlBackend.

use async_trait::async_trait;
use chrono::Utc;
use libsql::{TransactionBehavior, params};
use uuid::Uuid;

use super::{
    LibSqlBackend, fmt_ts, get_i64, get_opt_text, get_parsed, get_text, map_write_err, parse_ts,
};
use crate::db::{GardenStore, GardenTransaction};
use crate::error::DatabaseError;
use crate::garden::engine::{GROWTH_HEALTH_FLOOR, TRANSFORM_AGE, TRANSFORM_HEALTH};
use crate::garden::habits::HistoryUpdate;
use crate::garden::{
    Dimension, HabitSnapshot, InitialHabits, MAX_LEVEL, PerDimension, Plant, Polarity,
    StreakCounters, TrendHistory, Verdict,
};

const PLANT_COLUMNS: &str = "id, user_id, dimension, slot, polarity, species, health, age";

/// Convert a libsql Row to a Plant.
///
/// Column order follows [`PLANT_COLUMNS`].
fn row_to_plant(row: &libsql::Row) -> Result<Plant, DatabaseError> {
    let id_str = get_text(row, 0)?;
    let id: Uuid = id_str
        .parse()
        .map_err(|e| DatabaseError::Serialization(format!("invalid plant id: {e}")))?;

    Ok(Plant {
        id,
        user_id: get_text(row, 1)?,
        dimension: get_parsed(row, 2)?,
        slot: get_parsed(row, 3)?,
        polarity: get_parsed(row, 4)?,
        species: get_text(row, 5)?,
        health: get_i64(row, 6)?,
        age: get_i64(row, 7)?,
    })
}

fn to_json(list: &[String]) -> Result<String, DatabaseError> {
    serde_json::to_string(list).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, DatabaseError> {
    serde_json::from_str(text).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn query_err(e: libsql::Error) -> DatabaseError {
    DatabaseError::Query(e.to_string())
}

#[async_trait]
impl GardenStore for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        self.apply_schema().await
    }

    async fn list_plants(&self, user_id: &str) -> Result<Vec<Plant>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {PLANT_COLUMNS} FROM plants WHERE user_id = ?1 \
                     ORDER BY CASE dimension WHEN 'food' THEN 0 WHEN 'health' THEN 1 ELSE 2 END, slot"
                ),
                params![user_id],
            )
            .await
            .map_err(query_err)?;

        let mut plants = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            plants.push(row_to_plant(&row)?);
        }
        Ok(plants)
    }

    async fn get_streaks(&self, user_id: &str) -> Result<Option<StreakCounters>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                "SELECT food, health, toxic FROM streaks WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(StreakCounters {
                food: get_i64(&row, 0)?,
                health: get_i64(&row, 1)?,
                toxic: get_i64(&row, 2)?,
            })),
            None => Ok(None),
        }
    }

    async fn get_history(&self, user_id: &str) -> Result<Option<TrendHistory>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                "SELECT food, health, toxic, baseline, revision, updated_at \
                 FROM trend_history WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(query_err)?;

        let Some(row) = rows.next().await.map_err(query_err)? else {
            return Ok(None);
        };

        let baseline = match get_opt_text(&row, 3)? {
            Some(text) => Some(from_json::<InitialHabits>(&text)?),
            None => None,
        };

        Ok(Some(TrendHistory {
            snapshot: HabitSnapshot {
                food: from_json(&get_text(&row, 0)?)?,
                health: from_json(&get_text(&row, 1)?)?,
                toxic: from_json(&get_text(&row, 2)?)?,
            },
            baseline,
            revision: get_i64(&row, 4)?,
            updated_at: parse_ts(&get_text(&row, 5)?)?,
        }))
    }

    async fn recent_status(
        &self,
        user_id: &str,
        dimension: Dimension,
        limit: usize,
    ) -> Result<Vec<Verdict>, DatabaseError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                "SELECT verdict FROM status_track WHERE user_id = ?1 AND dimension = ?2 \
                 ORDER BY seq DESC LIMIT ?3",
                params![user_id, dimension.as_str(), limit as i64],
            )
            .await
            .map_err(query_err)?;

        let mut verdicts = Vec::with_capacity(limit);
        while let Some(row) = rows.next().await.map_err(query_err)? {
            verdicts.push(get_parsed(&row, 0)?);
        }
        Ok(verdicts)
    }

    async fn begin(&self, user_id: &str) -> Result<Box<dyn GardenTransaction>, DatabaseError> {
        let conn = self.connect().await?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(query_err)?;
        Ok(Box::new(LibSqlGardenTransaction {
            user_id: user_id.to_string(),
            tx: Some(tx),
        }))
    }
}

/// Open libSQL transaction scoped to one user.
struct LibSqlGardenTransaction {
    user_id: String,
    tx: Option<libsql::Transaction>,
}

impl LibSqlGardenTransaction {
    fn tx(&self) -> Result<&libsql::Transaction, DatabaseError> {
        self.tx
            .as_ref()
            .ok_or_else(|| DatabaseError::Query("transaction already finished".to_string()))
    }

    fn not_found(&self, entity: &str) -> DatabaseError {
        DatabaseError::NotFound {
            entity: entity.to_string(),
            id: self.user_id.clone(),
        }
    }
}

#[async_trait]
impl GardenTransaction for LibSqlGardenTransaction {
    async fn insert_plant(&mut self, plant: &Plant) -> Result<(), DatabaseError> {
        self.tx()?
            .execute(
                &format!("INSERT INTO plants ({PLANT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
                params![
                    plant.id.to_string(),
                    self.user_id.as_str(),
                    plant.dimension.as_str(),
                    plant.slot.as_str(),
                    plant.polarity.as_str(),
                    plant.species.as_str(),
                    plant.health,
                    plant.age,
                ],
            )
            .await
            .map_err(map_write_err)?;
        Ok(())
    }

    async fn create_streaks(&mut self) -> Result<(), DatabaseError> {
        self.tx()?
            .execute(
                "INSERT INTO streaks (user_id, food, health, toxic) VALUES (?1, 0, 0, 0)",
                params![self.user_id.as_str()],
            )
            .await
            .map_err(map_write_err)?;
        Ok(())
    }

    async fn create_history(
        &mut self,
        snapshot: &HabitSnapshot,
        baseline: &InitialHabits,
    ) -> Result<(), DatabaseError> {
        let baseline = serde_json::to_string(baseline)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.tx()?
            .execute(
                "INSERT INTO trend_history (user_id, food, health, toxic, baseline, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    self.user_id.as_str(),
                    to_json(&snapshot.food)?,
                    to_json(&snapshot.health)?,
                    to_json(&snapshot.toxic)?,
                    baseline,
                    fmt_ts(&Utc::now()),
                ],
            )
            .await
            .map_err(map_write_err)?;
        Ok(())
    }

    async fn apply_streak_delta(
        &mut self,
        deltas: &PerDimension<i64>,
    ) -> Result<(), DatabaseError> {
        let updated = self
            .tx()?
            .execute(
                "UPDATE streaks SET food = food + ?2, health = health + ?3, toxic = toxic + ?4, \
                 updated_at = datetime('now') WHERE user_id = ?1",
                params![self.user_id.as_str(), deltas.food, deltas.health, deltas.toxic],
            )
            .await
            .map_err(query_err)?;
        if updated == 0 {
            return Err(self.not_found("streaks"));
        }
        Ok(())
    }

    async fn reset_streak(&mut self, dimension: Dimension) -> Result<(), DatabaseError> {
        // Column names cannot be bound; `dimension` is a closed enum.
        let sql = format!(
            "UPDATE streaks SET {} = 0, updated_at = datetime('now') WHERE user_id = ?1",
            dimension.as_str()
        );
        let updated = self
            .tx()?
            .execute(&sql, params![self.user_id.as_str()])
            .await
            .map_err(query_err)?;
        if updated == 0 {
            return Err(self.not_found("streaks"));
        }
        Ok(())
    }

    async fn append_status(
        &mut self,
        dimension: Dimension,
        verdict: Verdict,
    ) -> Result<(), DatabaseError> {
        self.tx()?
            .execute(
                "INSERT INTO status_track (user_id, dimension, verdict) VALUES (?1, ?2, ?3)",
                params![self.user_id.as_str(), dimension.as_str(), verdict.as_str()],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn adjust_health(
        &mut self,
        dimension: Dimension,
        polarity: Polarity,
        delta: i64,
        floor: i64,
        ceiling: i64,
    ) -> Result<u64, DatabaseError> {
        self.tx()?
            .execute(
                "UPDATE plants SET health = MIN(?5, MAX(?4, health + ?6)), updated_at = datetime('now') \
                 WHERE user_id = ?1 AND dimension = ?2 AND polarity = ?3",
                params![
                    self.user_id.as_str(),
                    dimension.as_str(),
                    polarity.as_str(),
                    floor,
                    ceiling,
                    delta,
                ],
            )
            .await
            .map_err(query_err)
    }

    async fn increment_age(
        &mut self,
        dimension: Dimension,
        polarity: Polarity,
    ) -> Result<u64, DatabaseError> {
        self.tx()?
            .execute(
                "UPDATE plants SET age = MIN(?5, age + 1), updated_at = datetime('now') \
                 WHERE user_id = ?1 AND dimension = ?2 AND polarity = ?3 \
                 AND health > ?4 AND age < ?5",
                params![
                    self.user_id.as_str(),
                    dimension.as_str(),
                    polarity.as_str(),
                    GROWTH_HEALTH_FLOOR,
                    MAX_LEVEL,
                ],
            )
            .await
            .map_err(query_err)
    }

    async fn transform(
        &mut self,
        plant_id: Uuid,
        polarity: Polarity,
        species: &str,
    ) -> Result<(), DatabaseError> {
        let updated = self
            .tx()?
            .execute(
                "UPDATE plants SET polarity = ?3, species = ?4, health = ?5, age = ?6, \
                 updated_at = datetime('now') WHERE id = ?1 AND user_id = ?2",
                params![
                    plant_id.to_string(),
                    self.user_id.as_str(),
                    polarity.as_str(),
                    species,
                    TRANSFORM_HEALTH,
                    TRANSFORM_AGE,
                ],
            )
            .await
            .map_err(query_err)?;
        if updated == 0 {
            return Err(DatabaseError::NotFound {
                entity: "plant".to_string(),
                id: plant_id.to_string(),
            });
        }
        Ok(())
    }

    async fn update_history(
        &mut self,
        update: &HistoryUpdate,
        expected_revision: i64,
    ) -> Result<(), DatabaseError> {
        let encode = |list: &Option<Vec<String>>| list.as_deref().map(to_json).transpose();
        let food = encode(&update.food)?;
        let health = encode(&update.health)?;
        let toxic = encode(&update.toxic)?;

        let tx = self.tx()?;
        let updated = tx
            .execute(
                "UPDATE trend_history SET food = COALESCE(?2, food), health = COALESCE(?3, health), \
                 toxic = COALESCE(?4, toxic), revision = revision + 1, updated_at = ?5 \
                 WHERE user_id = ?1 AND revision = ?6",
                params![
                    self.user_id.as_str(),
                    food,
                    health,
                    toxic,
                    fmt_ts(&Utc::now()),
                    expected_revision,
                ],
            )
            .await
            .map_err(query_err)?;
        if updated > 0 {
            return Ok(());
        }

        let mut rows = tx
            .query(
                "SELECT 1 FROM trend_history WHERE user_id = ?1",
                params![self.user_id.as_str()],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(_) => Err(DatabaseError::Conflict {
                entity: "trend_history".to_string(),
                id: self.user_id.clone(),
            }),
            None => Err(self.not_found("trend_history")),
        }
    }

    async fn commit(&mut self) -> Result<(), DatabaseError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| DatabaseError::Query("transaction already finished".to_string()))?;
        tx.commit().await.map_err(map_write_err)
    }

    async fn rollback(&mut self) -> Result<(), DatabaseError> {
        match self.tx.take() {
            Some(tx) => tx.rollback().await.map_err(query_err),
            None => Ok(()),
        }
    }
}
