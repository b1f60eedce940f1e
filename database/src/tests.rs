#[cfg(test)]
mod tests {
    use crate::Database;
    use chrono::{Duration, TimeZone, Utc};
    use painminer_core::{
        ConfidenceTier, EvidenceSource, PainPointRecord, Platform, PostKey, RawPost, Run,
        ScoredPost,
    };
    use scoring_engine::{Aggregator, DedupLedger};
    use std::env;

    async fn setup_test_db() -> Database {
        let db_path = env::temp_dir().join(format!("pain-miner-test-{}.db", uuid::Uuid::new_v4()));
        let db_url = format!("sqlite://{}", db_path.display());
        Database::connect(&db_url)
            .await
            .expect("Failed to open test database")
    }

    fn scored(platform: Platform, id: &str, composite: f64) -> ScoredPost {
        let mut post = RawPost::new(platform, id);
        post.title = format!("Post {id}");
        post.body = "Exporting invoices is painful".to_string();
        post.url = format!("https://example.com/{id}");
        post.points = 42;
        post.num_comments = 7;
        post.created_at = Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        post.matched_queries.insert("invoicing frustrating".to_string());
        let mut scored = ScoredPost::zero(post);
        scored.pain_score = 0.5;
        scored.composite_score = composite;
        scored
    }

    fn record(description: &str, platform: Platform, url: &str) -> PainPointRecord {
        let mut record = PainPointRecord::new(description);
        record.emotional_intensity = 4;
        record.sources.push(EvidenceSource {
            url: url.to_string(),
            platform,
            quote: description.to_string(),
        });
        record
    }

    #[tokio::test]
    async fn test_connect_is_repeatable() {
        let db = setup_test_db().await;
        db.run_migrations().await.expect("Migrations should be idempotent");
        assert!(db.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_posts_round_trip_through_analysis() {
        let db = setup_test_db().await;
        let now = Utc::now();
        let posts = vec![
            scored(Platform::Hn, "1", 0.9),
            scored(Platform::Reddit, "abc", 0.6),
            scored(Platform::Hn, "2", 0.1),
        ];
        db.upsert_posts("invoicing", &posts, now).await.unwrap();

        let pending = db.unanalyzed_posts("invoicing", 0.2, 10).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].key(), PostKey::new(Platform::Hn, "1"));
        assert_eq!(pending[0].post.matched_queries, posts[0].post.matched_queries);
        assert_eq!(pending[0].post.created_at, posts[0].post.created_at);
        assert_eq!(pending[1].post.points, 42);

        db.mark_analyzed(&[pending[0].key()]).await.unwrap();
        let pending = db.unanalyzed_posts("invoicing", 0.2, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].post.id, "abc");

        // Refreshing the scores must not reset the analyzed flag.
        db.upsert_posts("invoicing", &posts, now).await.unwrap();
        assert_eq!(db.unanalyzed_posts("invoicing", 0.2, 10).await.unwrap().len(), 1);
        assert_eq!(db.posts_for_topic("invoicing").await.unwrap().len(), 3);
        assert!(db.posts_for_topic("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_keeps_first_timestamp() {
        let db = setup_test_db().await;
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let keys = vec![PostKey::new(Platform::Hn, "1"), PostKey::new(Platform::X, "99")];

        assert_eq!(db.mark_seen(&keys, first).await.unwrap(), 2);
        assert_eq!(db.mark_seen(&keys, first + Duration::days(3)).await.unwrap(), 0);

        let ledger = db
            .load_ledger(DedupLedger::new(Duration::days(180)))
            .await
            .unwrap();
        assert_eq!(ledger.len(), 2);
        assert!(ledger.has_seen(Platform::X, "99"));
        assert!(!ledger.has_seen(Platform::Reddit, "99"));
        assert_eq!(ledger.processed_at(Platform::Hn, "1"), Some(first));
    }

    #[tokio::test]
    async fn test_rerun_strengthens_stored_pain_point() {
        let db = setup_test_db().await;
        let aggregator = Aggregator::default();
        let now = Utc::now();

        let first = db
            .merge_pain_points(
                "invoicing",
                &aggregator,
                &[record("invoice export keeps failing", Platform::Hn, "https://news.ycombinator.com/item?id=1")],
                now,
            )
            .await
            .unwrap();
        assert_eq!(first.created, 1);

        let second = db
            .merge_pain_points(
                "invoicing",
                &aggregator,
                &[record("invoice export failing again", Platform::Reddit, "https://reddit.com/r/x/1")],
                now + Duration::hours(1),
            )
            .await
            .unwrap();
        assert_eq!(second.merged, 1);
        assert_eq!(second.created, 0);

        let stored = db.pain_points_for_topic("invoicing").await.unwrap();
        assert_eq!(stored.len(), 1);
        let point = &stored[0];
        assert_eq!(point.id, first.aggregates[0].id);
        assert_eq!(point.merge_count, 2);
        assert_eq!(point.platforms.len(), 2);
        assert_eq!(point.sources.len(), 2);
        assert!(point.confidence_tier >= ConfidenceTier::Medium);
        assert!(db.pain_points_for_topic("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_near_two_points_strengthens_only_one() {
        let db = setup_test_db().await;
        let aggregator = Aggregator::default();
        let now = Utc::now();

        db.merge_pain_points(
            "invoicing",
            &aggregator,
            &[
                record("invoice export broken", Platform::Hn, "https://news.ycombinator.com/item?id=1"),
                record("calendar sync slow", Platform::Hn, "https://news.ycombinator.com/item?id=2"),
            ],
            now,
        )
        .await
        .unwrap();

        let outcome = db
            .merge_pain_points(
                "invoicing",
                &aggregator,
                &[record(
                    "invoice export broken calendar sync",
                    Platform::Reddit,
                    "https://reddit.com/r/x/2",
                )],
                now,
            )
            .await
            .unwrap();
        assert_eq!(outcome.merged, 1);
        assert_eq!(outcome.created, 0);

        let stored = db.pain_points_for_topic("invoicing").await.unwrap();
        assert_eq!(stored.len(), 2);
        let invoice = stored.iter().find(|p| p.description == "invoice export broken").unwrap();
        let calendar = stored.iter().find(|p| p.description == "calendar sync slow").unwrap();
        assert_eq!(invoice.merge_count, 2);
        assert!(invoice.platforms.contains(&Platform::Reddit));
        assert_eq!(calendar.merge_count, 1);
        assert!(!calendar.platforms.contains(&Platform::Reddit));
    }

    #[tokio::test]
    async fn test_runs_latest_per_topic() {
        let db = setup_test_db().await;
        let mut run = Run::start("invoicing", vec![Platform::Hn, Platform::Reddit]);
        let id = db.save_run(&run).await.unwrap();
        run.id = Some(id);
        run.posts_fetched = 12;
        run.posts_analyzed = 5;
        run.pain_points = 2;
        run.completed_at = Some(run.started_at + Duration::seconds(30));
        run.report_path = Some("reports/2024-03-01-invoicing.md".to_string());
        assert_eq!(db.save_run(&run).await.unwrap(), id);

        let mut later = Run::start("scheduling", vec![Platform::X]);
        later.started_at = run.started_at + Duration::minutes(5);
        db.save_run(&later).await.unwrap();

        let latest = db.latest_run(Some("invoicing")).await.unwrap().unwrap();
        assert_eq!(latest.id, Some(id));
        assert_eq!(latest.platforms, vec![Platform::Hn, Platform::Reddit]);
        assert_eq!(latest.posts_fetched, 12);
        assert_eq!(latest.elapsed(), Some(Duration::seconds(30)));
        assert_eq!(latest.report_path, run.report_path);

        let overall = db.latest_run(None).await.unwrap().unwrap();
        assert_eq!(overall.topic, "scheduling");
        assert!(db.latest_run(Some("nothing")).await.unwrap().is_none());
    }
}
