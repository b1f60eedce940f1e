use crate::{corrupt, sql_error, Database};
use painminer_core::{CoreError, Platform, Run};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

fn platforms_column(platforms: &[Platform]) -> String {
    platforms
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn row_to_run(row: &SqliteRow) -> Result<Run, CoreError> {
    let platforms: String = row.try_get("platforms").map_err(sql_error)?;
    let platforms = platforms
        .split(',')
        .filter(|p| !p.is_empty())
        .map(str::parse::<Platform>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| corrupt("runs", e))?;
    let count = |column: &str| -> Result<u32, CoreError> {
        let value: i64 = row.try_get(column).map_err(sql_error)?;
        u32::try_from(value).map_err(|e| corrupt("runs", e))
    };

    Ok(Run {
        id: Some(row.try_get("id").map_err(sql_error)?),
        topic: row.try_get("topic").map_err(sql_error)?,
        platforms,
        started_at: row.try_get("started_at").map_err(sql_error)?,
        completed_at: row.try_get("completed_at").map_err(sql_error)?,
        posts_fetched: count("posts_fetched")?,
        posts_analyzed: count("posts_analyzed")?,
        pain_points: count("pain_points")?,
        report_path: row.try_get("report_path").map_err(sql_error)?,
    })
}

impl Database {
    /// Insert a run, or update it when it already has an id. Returns the id.
    pub async fn save_run(&self, run: &Run) -> Result<i64, CoreError> {
        match run.id {
            None => {
                let result = sqlx::query(
                    "INSERT INTO runs (topic, platforms, started_at, completed_at, posts_fetched,
                                       posts_analyzed, pain_points, report_path)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&run.topic)
                .bind(platforms_column(&run.platforms))
                .bind(run.started_at)
                .bind(run.completed_at)
                .bind(i64::from(run.posts_fetched))
                .bind(i64::from(run.posts_analyzed))
                .bind(i64::from(run.pain_points))
                .bind(&run.report_path)
                .execute(&self.pool)
                .await
                .map_err(sql_error)?;
                Ok(result.last_insert_rowid())
            }
            Some(id) => {
                sqlx::query(
                    "UPDATE runs SET completed_at = ?, posts_fetched = ?, posts_analyzed = ?,
                                     pain_points = ?, report_path = ?
                     WHERE id = ?",
                )
                .bind(run.completed_at)
                .bind(i64::from(run.posts_fetched))
                .bind(i64::from(run.posts_analyzed))
                .bind(i64::from(run.pain_points))
                .bind(&run.report_path)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(sql_error)?;
                Ok(id)
            }
        }
    }

    /// The most recent run, optionally restricted to one topic.
    pub async fn latest_run(&self, topic: Option<&str>) -> Result<Option<Run>, CoreError> {
        let row = match topic {
            Some(topic) => {
                sqlx::query("SELECT * FROM runs WHERE topic = ? ORDER BY started_at DESC, id DESC LIMIT 1")
                    .bind(topic)
                    .fetch_optional(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM runs ORDER BY started_at DESC, id DESC LIMIT 1")
                    .fetch_optional(&self.pool)
                    .await
            }
        }
        .map_err(sql_error)?;
        row.as_ref().map(row_to_run).transpose()
    }
}
