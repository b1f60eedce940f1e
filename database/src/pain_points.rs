use crate::{corrupt, sql_error, Database};
use chrono::{DateTime, Utc};
use painminer_core::{AggregatedPainPoint, CoreError, PainPointRecord};
use scoring_engine::{AggregationOutcome, Aggregator};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};
use tracing::info;

const SELECT_TOPIC: &str = "SELECT record FROM pain_points WHERE topic = ? ORDER BY first_seen, id";

fn row_to_point(row: &SqliteRow) -> Result<AggregatedPainPoint, CoreError> {
    let record: String = row.try_get("record").map_err(sql_error)?;
    serde_json::from_str(&record).map_err(|e| corrupt("pain_points", e))
}

async fn save(
    tx: &mut Transaction<'_, Sqlite>,
    topic: &str,
    point: &AggregatedPainPoint,
) -> Result<(), CoreError> {
    let platforms: Vec<&str> = point.platforms.iter().map(|p| p.as_str()).collect();
    sqlx::query(
        r#"
        INSERT INTO pain_points (
            id, topic, description, category, merge_count, unique_users, platforms,
            confidence_tier, cross_platform_strength, record, first_seen, last_seen
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            description = excluded.description,
            category = excluded.category,
            merge_count = excluded.merge_count,
            unique_users = excluded.unique_users,
            platforms = excluded.platforms,
            confidence_tier = excluded.confidence_tier,
            cross_platform_strength = excluded.cross_platform_strength,
            record = excluded.record,
            last_seen = excluded.last_seen
        "#,
    )
    .bind(point.id.to_string())
    .bind(topic)
    .bind(&point.description)
    .bind(point.category.as_str())
    .bind(i64::from(point.merge_count))
    .bind(i64::from(point.unique_users))
    .bind(platforms.join(","))
    .bind(point.confidence_tier.as_str())
    .bind(point.cross_platform_strength.as_str())
    .bind(serde_json::to_string(point)?)
    .bind(point.first_seen)
    .bind(point.last_seen)
    .execute(&mut **tx)
    .await
    .map_err(sql_error)?;
    Ok(())
}

impl Database {
    /// Every aggregate stored for a topic, oldest first.
    pub async fn pain_points_for_topic(
        &self,
        topic: &str,
    ) -> Result<Vec<AggregatedPainPoint>, CoreError> {
        let rows = sqlx::query(SELECT_TOPIC)
            .bind(topic)
            .fetch_all(&self.pool)
            .await
            .map_err(sql_error)?;
        rows.iter().map(row_to_point).collect()
    }

    /// Load a topic's aggregates, fold `records` in and write the result back,
    /// all inside one transaction.
    pub async fn merge_pain_points(
        &self,
        topic: &str,
        aggregator: &Aggregator,
        records: &[PainPointRecord],
        now: DateTime<Utc>,
    ) -> Result<AggregationOutcome, CoreError> {
        let mut tx = self.pool.begin().await.map_err(sql_error)?;

        let rows = sqlx::query(SELECT_TOPIC)
            .bind(topic)
            .fetch_all(&mut *tx)
            .await
            .map_err(sql_error)?;
        let existing = rows.iter().map(row_to_point).collect::<Result<Vec<_>, _>>()?;

        let outcome = aggregator.merge_at(existing, records, now);
        for point in &outcome.aggregates {
            save(&mut tx, topic, point).await?;
        }
        tx.commit().await.map_err(sql_error)?;

        info!(
            "Stored pain points for '{}': {} new, {} merged",
            topic, outcome.created, outcome.merged
        );
        Ok(outcome)
    }
}
