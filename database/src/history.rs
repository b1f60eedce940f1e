use crate::{corrupt, sql_error, Database};
use chrono::{DateTime, Utc};
use painminer_core::{CoreError, Platform, PostKey};
use scoring_engine::DedupLedger;
use sqlx::Row;

impl Database {
    /// Every processed post key with the time it was first processed.
    pub async fn history(&self) -> Result<Vec<(PostKey, DateTime<Utc>)>, CoreError> {
        let rows = sqlx::query("SELECT platform, id, processed_at FROM history")
            .fetch_all(&self.pool)
            .await
            .map_err(sql_error)?;

        rows.iter()
            .map(|row| -> Result<(PostKey, DateTime<Utc>), CoreError> {
                let platform: String = row.try_get("platform").map_err(sql_error)?;
                let platform = platform
                    .parse::<Platform>()
                    .map_err(|e| corrupt("history", e))?;
                Ok((
                    PostKey::new(platform, row.try_get::<String, _>("id").map_err(sql_error)?),
                    row.try_get("processed_at").map_err(sql_error)?,
                ))
            })
            .collect()
    }

    /// A ledger seeded with the stored history.
    pub async fn load_ledger(&self, ledger: DedupLedger) -> Result<DedupLedger, CoreError> {
        Ok(ledger.with_entries(self.history().await?))
    }

    /// Record keys as processed. Keys already present keep their first timestamp.
    pub async fn mark_seen(&self, keys: &[PostKey], processed_at: DateTime<Utc>) -> Result<u64, CoreError> {
        let mut tx = self.pool.begin().await.map_err(sql_error)?;
        let mut inserted = 0;
        for key in keys {
            let result = sqlx::query(
                "INSERT INTO history (platform, id, processed_at) VALUES (?, ?, ?)
                 ON CONFLICT(platform, id) DO NOTHING",
            )
            .bind(key.platform.as_str())
            .bind(&key.id)
            .bind(processed_at)
            .execute(&mut *tx)
            .await
            .map_err(sql_error)?;
            inserted += result.rows_affected();
        }
        tx.commit().await.map_err(sql_error)?;
        Ok(inserted)
    }
}
