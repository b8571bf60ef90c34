//! Persistence for permanent rule state.
//!
//! One row per `(scope, rule_id)`. Saving is an idempotent upsert of the
//! whole exported set inside a single transaction, so a crash mid-save
//! leaves the previous snapshot intact.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tripwire_types::{PersistedRuleState, RuleId, ScopeKey};

use crate::error::DbError;

/// Operations on the `trigger_state` table.
pub struct RuleStateStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RuleStateStore<'a> {
    /// Create a new store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert every record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if any statement fails; nothing is
    /// written in that case.
    pub async fn save_all(&self, records: &[PersistedRuleState]) -> Result<(), DbError> {
        let updated_at = Utc::now();
        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                r"INSERT INTO trigger_state (scope, rule_id, fire_count, last_fired_at, updated_at)
                  VALUES (?1, ?2, ?3, ?4, ?5)
                  ON CONFLICT (scope, rule_id) DO UPDATE SET
                    fire_count = excluded.fire_count,
                    last_fired_at = excluded.last_fired_at,
                    updated_at = excluded.updated_at",
            )
            .bind(record.scope.to_string())
            .bind(record.rule_id.as_str())
            .bind(i64::from(record.fire_count))
            .bind(record.last_fired_at)
            .bind(updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::debug!(records = records.len(), "Saved permanent trigger state");
        Ok(())
    }

    /// Every stored record, ordered by scope and rule.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails or
    /// [`DbError::Corrupt`] if a row no longer decodes.
    pub async fn load_all(&self) -> Result<Vec<PersistedRuleState>, DbError> {
        let rows = sqlx::query_as::<_, RuleStateRow>(
            r"SELECT scope, rule_id, fire_count, last_fired_at, updated_at
              FROM trigger_state
              ORDER BY scope, rule_id",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(RuleStateRow::into_state).collect()
    }

    /// Stored records of one scope.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails or
    /// [`DbError::Corrupt`] if a row no longer decodes.
    pub async fn load_scope(&self, scope: &ScopeKey) -> Result<Vec<PersistedRuleState>, DbError> {
        let rows = sqlx::query_as::<_, RuleStateRow>(
            r"SELECT scope, rule_id, fire_count, last_fired_at, updated_at
              FROM trigger_state
              WHERE scope = ?1
              ORDER BY rule_id",
        )
        .bind(scope.to_string())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(RuleStateRow::into_state).collect()
    }

    /// Forget a scope's records. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the delete fails.
    pub async fn delete_scope(&self, scope: &ScopeKey) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM trigger_state WHERE scope = ?1")
            .bind(scope.to_string())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// A raw `trigger_state` row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RuleStateRow {
    /// Scope key in `room:<id>` / `area:<id>` form.
    pub scope: String,
    /// Rule identifier.
    pub rule_id: String,
    /// Successful firings.
    pub fire_count: i64,
    /// Most recent successful firing.
    pub last_fired_at: Option<DateTime<Utc>>,
    /// When the row was last written.
    pub updated_at: DateTime<Utc>,
}

impl RuleStateRow {
    /// Decode into the engine's record type.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Corrupt`] if the scope key does not parse or the
    /// fire count is out of range.
    pub fn into_state(self) -> Result<PersistedRuleState, DbError> {
        let corrupt = |reason: String| DbError::Corrupt {
            scope: self.scope.clone(),
            rule_id: self.rule_id.clone(),
            reason,
        };
        let scope: ScopeKey = self.scope.parse().map_err(|e| corrupt(format!("{e}")))?;
        let fire_count = u32::try_from(self.fire_count)
            .map_err(|e| corrupt(format!("fire_count {}: {e}", self.fire_count)))?;
        Ok(PersistedRuleState {
            rule_id: RuleId::from(self.rule_id.as_str()),
            scope,
            fire_count,
            last_fired_at: self.last_fired_at,
        })
    }
}
