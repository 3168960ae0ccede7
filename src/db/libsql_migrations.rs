//! SQLite-dialect schema for the libSQL backend.
//!
//! Applied on every start; idempotent via `IF NOT EXISTS`.
//!
//! Type mapping:
//! - UUIDs -> `TEXT` (hyphenated string)
//! - timestamps -> `TEXT` (RFC 3339)
//! - habit lists -> `TEXT` (JSON array)

/// Current schema version, recorded in `_migrations`.
pub const SCHEMA_VERSION: i64 = 1;

pub const SCHEMA: &str = r#"

-- ==================== Migration tracking ====================

CREATE TABLE IF NOT EXISTS _migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ==================== Plants ====================

CREATE TABLE IF NOT EXISTS plants (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    dimension TEXT NOT NULL CHECK (dimension IN ('food', 'health', 'toxic')),
    slot TEXT NOT NULL CHECK (slot IN ('A', 'B')),
    polarity TEXT NOT NULL CHECK (polarity IN ('good', 'bad')),
    species TEXT NOT NULL,
    health INTEGER NOT NULL CHECK (health BETWEEN 0 AND 10),
    age INTEGER NOT NULL CHECK (age BETWEEN 0 AND 10),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (user_id, dimension, slot)
);

CREATE INDEX IF NOT EXISTS idx_plants_user_dimension ON plants(user_id, dimension, polarity);

-- ==================== Streak counters ====================

CREATE TABLE IF NOT EXISTS streaks (
    user_id TEXT PRIMARY KEY,
    food INTEGER NOT NULL DEFAULT 0,
    health INTEGER NOT NULL DEFAULT 0,
    toxic INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ==================== Trend history ====================

CREATE TABLE IF NOT EXISTS trend_history (
    user_id TEXT PRIMARY KEY,
    food TEXT NOT NULL DEFAULT '[]',
    health TEXT NOT NULL DEFAULT '[]',
    toxic TEXT NOT NULL DEFAULT '[]',
    baseline TEXT,
    revision INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);

-- ==================== Status track ====================

CREATE TABLE IF NOT EXISTS status_track (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    dimension TEXT NOT NULL CHECK (dimension IN ('food', 'health', 'toxic')),
    verdict TEXT NOT NULL CHECK (verdict IN ('progress', 'degrade', 'constant')),
    recorded_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_status_track_user_dimension
    ON status_track(user_id, dimension, seq);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent_ddl() {
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let ddl: String = statement
                .lines()
                .filter(|l| !l.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n");
            let ddl = ddl.trim();
            if ddl.is_empty() {
                continue;
            }
            assert!(ddl.contains("IF NOT EXISTS"), "not idempotent: {ddl}");
        }
    }
}
