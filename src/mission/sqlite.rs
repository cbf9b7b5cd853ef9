use super::state::{MissionState, validate_transition};
use super::store::MissionStore;
use super::types::{Mission, MissionEvent, NewMission};
use crate::error::MissionError;
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use uuid::Uuid;

const MISSION_COLUMNS: &str = "mission_id, title, goal, state, schedule_interval_secs,
    retry_limit, retry_count, max_concurrency, context_json,
    created_at, updated_at, started_at, completed_at";

/// SQLite-backed mission store.
#[derive(Debug, Clone)]
pub struct SqliteMissionStore {
    pool: SqlitePool,
}

impl SqliteMissionStore {
    /// Opens `<workspace>/missions/missions.db`, creating it when missing.
    pub async fn open_in_workspace(workspace_dir: &Path) -> Result<Self> {
        Self::open(&workspace_dir.join("missions").join("missions.db")).await
    }

    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create mission directory: {}", parent.display())
            })?;
        }

        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .with_context(|| format!("Failed to open mission DB: {}", db_path.display()))?;

        ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn create_mission(&self, new: NewMission) -> Result<String> {
        let mission_id = Uuid::new_v4().to_string();
        let now = format_ts(Utc::now());
        let context_json =
            serde_json::to_string(&new.context).context("Failed to encode mission context")?;

        sqlx::query(
            "INSERT INTO missions (
                mission_id, title, goal, state, schedule_interval_secs,
                retry_limit, retry_count, max_concurrency, context_json,
                created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?)",
        )
        .bind(&mission_id)
        .bind(&new.title)
        .bind(&new.goal)
        .bind(MissionState::Idle.as_str())
        .bind(new.schedule_interval_secs.map(to_i64))
        .bind(i64::from(new.retry_limit))
        .bind(i64::from(new.max_concurrency.max(1)))
        .bind(context_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .context("Failed to insert mission")?;

        Ok(mission_id)
    }

    pub async fn get_mission(&self, mission_id: &str) -> Result<Option<Mission>> {
        let row = sqlx::query(&format!(
            "SELECT {MISSION_COLUMNS} FROM missions WHERE mission_id = ?"
        ))
        .bind(mission_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_mission).transpose()
    }

    pub async fn list_all_missions(&self) -> Result<Vec<Mission>> {
        let rows = sqlx::query(&format!(
            "SELECT {MISSION_COLUMNS} FROM missions ORDER BY created_at ASC, rowid ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_mission).collect()
    }

    pub async fn list_mission_events(&self, mission_id: &str) -> Result<Vec<MissionEvent>> {
        let rows = sqlx::query(
            "SELECT id, mission_id, from_state, to_state, reason, created_at
             FROM mission_events WHERE mission_id = ? ORDER BY id ASC",
        )
        .bind(mission_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect()
    }

    pub async fn reset_mission_retry(&self, mission_id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE missions SET retry_count = 0 WHERE mission_id = ?")
            .bind(mission_id)
            .execute(&self.pool)
            .await
            .context("Failed to reset mission retry count")?;

        if result.rows_affected() == 0 {
            return Err(MissionError::NotFound(mission_id.to_string()).into());
        }
        Ok(())
    }

    async fn fetch_by_state(&self, state: MissionState) -> Result<Vec<Mission>> {
        let rows = sqlx::query(&format!(
            "SELECT {MISSION_COLUMNS} FROM missions
             WHERE state = ? ORDER BY created_at ASC, rowid ASC"
        ))
        .bind(state.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_mission).collect()
    }

    async fn apply_transition(
        &self,
        mission_id: &str,
        to: MissionState,
        reason: &str,
    ) -> Result<Mission> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {MISSION_COLUMNS} FROM missions WHERE mission_id = ?"
        ))
        .bind(mission_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Err(MissionError::NotFound(mission_id.to_string()).into());
        };
        let mut mission = row_to_mission(&row)?;
        let from = mission.state;
        validate_transition(from, to)?;

        let now = Utc::now();
        if from == MissionState::Idle && to == MissionState::Running {
            mission.started_at = Some(now);
            mission.completed_at = None;
        }
        if to == MissionState::Completed {
            mission.completed_at = Some(now);
        }

        let updated = sqlx::query(
            "UPDATE missions
             SET state = ?, updated_at = ?, started_at = ?, completed_at = ?
             WHERE mission_id = ? AND state = ?",
        )
        .bind(to.as_str())
        .bind(format_ts(now))
        .bind(mission.started_at.map(format_ts))
        .bind(mission.completed_at.map(format_ts))
        .bind(mission_id)
        .bind(from.as_str())
        .execute(&mut *tx)
        .await
        .context("Failed to update mission state")?;

        if updated.rows_affected() == 0 {
            return Err(MissionError::ConcurrentUpdate(mission_id.to_string()).into());
        }

        sqlx::query(
            "INSERT INTO mission_events (mission_id, from_state, to_state, reason, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(mission_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(reason)
        .bind(format_ts(now))
        .execute(&mut *tx)
        .await
        .context("Failed to append mission event")?;

        tx.commit().await.context("Failed to commit mission transition")?;

        mission.state = to;
        mission.updated_at = now;
        Ok(mission)
    }

    async fn bump_retry(&self, mission_id: &str) -> Result<u32> {
        let row = sqlx::query(
            "UPDATE missions SET retry_count = retry_count + 1
             WHERE mission_id = ? RETURNING retry_count",
        )
        .bind(mission_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to increment mission retry count")?;

        match row {
            Some(row) => Ok(to_u32(row.get("retry_count"))),
            None => Err(MissionError::NotFound(mission_id.to_string()).into()),
        }
    }
}

impl MissionStore for SqliteMissionStore {
    fn list_missions(
        &self,
        state: MissionState,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Mission>>> + Send + '_>> {
        Box::pin(self.fetch_by_state(state))
    }

    fn transition_mission<'a>(
        &'a self,
        mission_id: &'a str,
        to: MissionState,
        reason: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Mission>> + Send + 'a>> {
        Box::pin(self.apply_transition(mission_id, to, reason))
    }

    fn increment_mission_retry<'a>(
        &'a self,
        mission_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<u32>> + Send + 'a>> {
        Box::pin(self.bump_retry(mission_id))
    }
}

// ── Schema ──────────────────────────────────────────────────────────────────

async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS missions (
            mission_id             TEXT PRIMARY KEY,
            title                  TEXT NOT NULL,
            goal                   TEXT NOT NULL,
            state                  TEXT NOT NULL DEFAULT 'idle',
            schedule_interval_secs INTEGER,
            retry_limit            INTEGER NOT NULL DEFAULT 3,
            retry_count            INTEGER NOT NULL DEFAULT 0,
            max_concurrency        INTEGER NOT NULL DEFAULT 1,
            context_json           TEXT NOT NULL DEFAULT '{}',
            created_at             TEXT NOT NULL,
            updated_at             TEXT NOT NULL,
            started_at             TEXT,
            completed_at           TEXT
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create missions table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS mission_events (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            mission_id TEXT NOT NULL,
            from_state TEXT NOT NULL,
            to_state   TEXT NOT NULL,
            reason     TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create mission_events table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_missions_state ON missions(state)")
        .execute(pool)
        .await
        .context("Failed to create missions index")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_mission_events_mission ON mission_events(mission_id)",
    )
    .execute(pool)
    .await
    .context("Failed to create mission_events index")?;

    Ok(())
}

// ── Row mapping ─────────────────────────────────────────────────────────────

fn row_to_mission(row: &SqliteRow) -> Result<Mission> {
    let state_raw: String = row.get("state");
    let interval_raw: Option<i64> = row.get("schedule_interval_secs");
    let context_raw: String = row.get("context_json");
    let created_raw: String = row.get("created_at");
    let updated_raw: String = row.get("updated_at");
    let started_raw: Option<String> = row.get("started_at");
    let completed_raw: Option<String> = row.get("completed_at");

    Ok(Mission {
        mission_id: row.get("mission_id"),
        title: row.get("title"),
        goal: row.get("goal"),
        state: state_raw.parse()?,
        schedule_interval_secs: interval_raw.map(|secs| u64::try_from(secs).unwrap_or(0)),
        retry_limit: to_u32(row.get("retry_limit")),
        retry_count: to_u32(row.get("retry_count")),
        max_concurrency: to_u32(row.get("max_concurrency")).max(1),
        context: serde_json::from_str(&context_raw).unwrap_or(serde_json::Value::Null),
        created_at: parse_ts(&created_raw)?,
        updated_at: parse_ts(&updated_raw)?,
        started_at: started_raw.as_deref().map(parse_ts).transpose()?,
        completed_at: completed_raw.as_deref().map(parse_ts).transpose()?,
    })
}

fn row_to_event(row: &SqliteRow) -> Result<MissionEvent> {
    let from_raw: String = row.get("from_state");
    let to_raw: String = row.get("to_state");
    let created_raw: String = row.get("created_at");

    Ok(MissionEvent {
        id: row.get("id"),
        mission_id: row.get("mission_id"),
        from_state: from_raw.parse()?,
        to_state: to_raw.parse()?,
        reason: row.get("reason"),
        created_at: parse_ts(&created_raw)?,
    })
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp in mission DB: {raw}"))
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
