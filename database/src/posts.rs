use crate::{corrupt, sql_error, Database};
use chrono::{DateTime, Utc};
use painminer_core::{CoreError, Platform, PostKey, RawPost, ScoredPost};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::BTreeSet;

const POST_COLUMNS: &str = "platform, id, url, title, body, author, community, points, num_comments, \
     created_at, matched_queries, engagement_score, pain_score, demand_score, relevance_score, \
     cross_query_score, composite_score";

fn row_to_post(row: &SqliteRow) -> Result<ScoredPost, CoreError> {
    let platform: String = row.try_get("platform").map_err(sql_error)?;
    let platform: Platform = platform.parse().map_err(|e| corrupt("posts", e))?;
    let queries: String = row.try_get("matched_queries").map_err(sql_error)?;
    let matched_queries: BTreeSet<String> =
        serde_json::from_str(&queries).map_err(|e| corrupt("posts", e))?;

    let mut post = RawPost::new(platform, row.try_get::<String, _>("id").map_err(sql_error)?);
    post.url = row.try_get("url").map_err(sql_error)?;
    post.title = row.try_get("title").map_err(sql_error)?;
    post.body = row.try_get("body").map_err(sql_error)?;
    post.author = row.try_get("author").map_err(sql_error)?;
    post.community = row.try_get("community").map_err(sql_error)?;
    post.points = row.try_get("points").map_err(sql_error)?;
    post.num_comments = row.try_get("num_comments").map_err(sql_error)?;
    post.created_at = row.try_get("created_at").map_err(sql_error)?;
    post.matched_queries = matched_queries;

    Ok(ScoredPost {
        post,
        engagement_score: row.try_get("engagement_score").map_err(sql_error)?,
        pain_score: row.try_get("pain_score").map_err(sql_error)?,
        demand_score: row.try_get("demand_score").map_err(sql_error)?,
        relevance_score: row.try_get("relevance_score").map_err(sql_error)?,
        cross_query_score: row.try_get("cross_query_score").map_err(sql_error)?,
        composite_score: row.try_get("composite_score").map_err(sql_error)?,
    })
}

impl Database {
    /// Insert or refresh scored posts. The `analyzed` flag of a known post is kept.
    pub async fn upsert_posts(
        &self,
        topic: &str,
        posts: &[ScoredPost],
        fetched_at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await.map_err(sql_error)?;
        for scored in posts {
            let post = &scored.post;
            let queries = serde_json::to_string(&post.matched_queries)?;
            sqlx::query(
                r#"
                INSERT INTO posts (
                    platform, id, topic, url, title, body, author, community, points,
                    num_comments, created_at, matched_queries, engagement_score, pain_score,
                    demand_score, relevance_score, cross_query_score, composite_score, fetched_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(platform, id) DO UPDATE SET
                    topic = excluded.topic,
                    points = excluded.points,
                    num_comments = excluded.num_comments,
                    matched_queries = excluded.matched_queries,
                    engagement_score = excluded.engagement_score,
                    pain_score = excluded.pain_score,
                    demand_score = excluded.demand_score,
                    relevance_score = excluded.relevance_score,
                    cross_query_score = excluded.cross_query_score,
                    composite_score = excluded.composite_score,
                    fetched_at = excluded.fetched_at
                "#,
            )
            .bind(post.platform.as_str())
            .bind(&post.id)
            .bind(topic)
            .bind(&post.url)
            .bind(&post.title)
            .bind(&post.body)
            .bind(&post.author)
            .bind(&post.community)
            .bind(post.points)
            .bind(post.num_comments)
            .bind(post.created_at)
            .bind(queries)
            .bind(scored.engagement_score)
            .bind(scored.pain_score)
            .bind(scored.demand_score)
            .bind(scored.relevance_score)
            .bind(scored.cross_query_score)
            .bind(scored.composite_score)
            .bind(fetched_at)
            .execute(&mut *tx)
            .await
            .map_err(sql_error)?;
        }
        tx.commit().await.map_err(sql_error)?;
        Ok(())
    }

    /// Best-scoring posts of a topic that have not been through extraction yet.
    pub async fn unanalyzed_posts(
        &self,
        topic: &str,
        min_composite: f64,
        limit: usize,
    ) -> Result<Vec<ScoredPost>, CoreError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts
             WHERE topic = ? AND analyzed = 0 AND composite_score >= ?
             ORDER BY composite_score DESC, platform, id
             LIMIT ?"
        );
        let rows = sqlx::query(&sql)
            .bind(topic)
            .bind(min_composite)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(sql_error)?;
        rows.iter().map(row_to_post).collect()
    }

    /// Every stored post of a topic, best first.
    pub async fn posts_for_topic(&self, topic: &str) -> Result<Vec<ScoredPost>, CoreError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE topic = ?
             ORDER BY composite_score DESC, platform, id"
        );
        let rows = sqlx::query(&sql)
            .bind(topic)
            .fetch_all(&self.pool)
            .await
            .map_err(sql_error)?;
        rows.iter().map(row_to_post).collect()
    }

    pub async fn mark_analyzed(&self, keys: &[PostKey]) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await.map_err(sql_error)?;
        for key in keys {
            sqlx::query("UPDATE posts SET analyzed = 1 WHERE platform = ? AND id = ?")
                .bind(key.platform.as_str())
                .bind(&key.id)
                .execute(&mut *tx)
                .await
                .map_err(sql_error)?;
        }
        tx.commit().await.map_err(sql_error)?;
        Ok(())
    }
}
