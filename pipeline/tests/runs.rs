use async_trait::async_trait;
use database::Database;
use llm_interface::{Extractor, LlmProvider};
use painminer_core::{AppConfig, ConfigError, CoreError, Platform, RawPost, SourceError};
use pipeline::{ImportRequest, Pipeline};
use platform_clients::{FetchBatch, SourceAdapter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const REPLY: &str = r#"```json
[
  {
    "description": "Invoicing tools make chasing late payments painful",
    "category": "workflow_friction",
    "emotional_intensity": 4,
    "payment_signal": true,
    "payment_quote": "I would pay for automatic reminders",
    "unique_users": 2,
    "representative_quotes": ["chasing clients every month"],
    "source_urls": ["https://news.ycombinator.com/item?id=101"]
  }
]
```"#;

const PAINFUL: &str = "Invoicing is frustrating. I hate chasing clients, it is painful.";

/// Always answers with the same reply and counts how often it was asked.
struct CannedProvider {
    calls: Arc<AtomicUsize>,
}

impl LlmProvider for CannedProvider {
    fn name(&self) -> &str {
        "canned"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(REPLY.to_string())
    }
}

struct StubAdapter {
    platform: Platform,
    posts: Vec<RawPost>,
    fail: bool,
}

#[async_trait]
impl SourceAdapter for StubAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn fetch(&self, _topic: &str) -> Result<FetchBatch, CoreError> {
        if self.fail {
            return Err(SourceError::Unauthorized {
                platform: self.platform,
            }
            .into());
        }
        Ok(FetchBatch {
            platform: self.platform,
            posts: self.posts.clone(),
            queries_issued: 2,
            failed_queries: 0,
        })
    }
}

fn hn_post(id: &str, title: &str, body: &str) -> RawPost {
    let mut post = RawPost::new(Platform::Hn, id);
    post.title = title.to_string();
    post.body = body.to_string();
    post.url = format!("https://news.ycombinator.com/item?id={id}");
    post.points = 300;
    post.num_comments = 150;
    post.matched_queries.insert("invoicing frustrating".to_string());
    post
}

fn adapters(fail_reddit: bool) -> Vec<Box<dyn SourceAdapter>> {
    vec![
        Box::new(StubAdapter {
            platform: Platform::Hn,
            posts: vec![
                hn_post("101", "Invoicing for freelancers", PAINFUL),
                hn_post("102", "Ask HN: invoicing software?", PAINFUL),
                hn_post("103", "Show HN: my new static site generator", "Built it over a weekend."),
            ],
            fail: false,
        }),
        Box::new(StubAdapter {
            platform: Platform::Reddit,
            posts: Vec::new(),
            fail: fail_reddit,
        }),
    ]
}

fn test_config() -> AppConfig {
    let root = std::env::temp_dir().join(format!("pain-miner-pipeline-{}", uuid::Uuid::new_v4()));
    let mut config = AppConfig::default();
    config.output.dir = root.join("output");
    config.database.url = format!("sqlite://{}", root.join("pain_miner.db").display());
    config
}

async fn setup(with_llm: bool) -> (Pipeline<CannedProvider>, Arc<AtomicUsize>) {
    let config = test_config();
    let db = Database::connect(&config.database.url)
        .await
        .expect("Failed to open test database");
    let calls = Arc::new(AtomicUsize::new(0));
    let extractor = with_llm.then(|| {
        Extractor::new(
            CannedProvider {
                calls: Arc::clone(&calls),
            },
            &config.llm,
        )
    });
    let pipeline = Pipeline::new(config, db, extractor).expect("Failed to build pipeline");
    (pipeline, calls)
}

#[tokio::test]
async fn test_search_extracts_and_reports() {
    let (pipeline, calls) = setup(true).await;

    let summary = pipeline
        .search_with("invoicing", &adapters(true), true)
        .await
        .unwrap();

    assert_eq!(summary.fetched, 3);
    // The static site generator post is off topic.
    assert_eq!(summary.scored, 2);
    assert_eq!(summary.analyzed, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(summary.pain_points.len(), 1);
    assert!(!summary.found_nothing());

    let point = &summary.pain_points[0];
    assert!(point.payment_signal);
    assert_eq!(point.platforms.iter().copied().collect::<Vec<_>>(), vec![Platform::Hn]);

    let path = summary.report_path.clone().unwrap();
    let report = tokio::fs::read_to_string(&path).await.unwrap();
    assert!(report.contains("# Pain Point Research: invoicing"));
    assert!(report.contains("Invoicing tools make chasing late payments painful"));

    let run = pipeline
        .database()
        .latest_run(Some("invoicing"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.platforms, vec![Platform::Hn, Platform::Reddit]);
    assert_eq!(run.posts_analyzed, 2);
    assert_eq!(run.pain_points, 1);
    assert!(run.completed_at.is_some());

    let latest = pipeline.latest_report(Some("invoicing")).await.unwrap();
    assert_eq!(latest, Some(report));
}

#[tokio::test]
async fn test_rerun_skips_seen_posts() {
    let (pipeline, calls) = setup(true).await;
    pipeline
        .search_with("invoicing", &adapters(false), true)
        .await
        .unwrap();

    let again = pipeline
        .search_with("invoicing", &adapters(false), true)
        .await
        .unwrap();

    assert_eq!(again.fetched, 3);
    assert_eq!(again.scored, 0);
    assert_eq!(again.analyzed, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    // Earlier aggregates are still part of the topic.
    assert_eq!(again.pain_points.len(), 1);
}

#[tokio::test]
async fn test_no_analyze_then_analyze() {
    let (pipeline, calls) = setup(true).await;
    let searched = pipeline
        .search_with("invoicing", &adapters(false), false)
        .await
        .unwrap();
    assert_eq!(searched.analyzed, 0);
    assert!(searched.found_nothing());
    let report = tokio::fs::read_to_string(searched.report_path.unwrap())
        .await
        .unwrap();
    assert!(report.contains("No pain points found."));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let analyzed = pipeline.analyze("invoicing").await.unwrap();
    assert_eq!(analyzed.analyzed, 2);
    assert_eq!(analyzed.pain_points.len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let nothing_left = pipeline.analyze("invoicing").await.unwrap();
    assert_eq!(nothing_left.analyzed, 0);
    assert!(nothing_left.report_path.is_none());
    assert_eq!(nothing_left.pain_points.len(), 1);
}

#[tokio::test]
async fn test_analyze_without_key_is_a_config_error() {
    let (pipeline, _) = setup(false).await;
    let err = pipeline.analyze("invoicing").await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Config(ConfigError::MissingEnvironmentVariable { .. })
    ));
}

#[tokio::test]
async fn test_search_without_key_still_reports() {
    let (pipeline, _) = setup(false).await;
    let summary = pipeline
        .search_with("invoicing", &adapters(false), true)
        .await
        .unwrap();
    assert_eq!(summary.scored, 2);
    assert_eq!(summary.analyzed, 0);
    assert!(summary.found_nothing());
    assert!(summary.report_path.is_some());
}

#[tokio::test]
async fn test_import_runs_through_pipeline() {
    let (pipeline, calls) = setup(true).await;
    let file: PathBuf =
        std::env::temp_dir().join(format!("pain-miner-import-{}.json", uuid::Uuid::new_v4()));
    tokio::fs::write(
        &file,
        r#"[
            {"url": "https://x.com/a/status/1", "body": "Invoicing apps are so frustrating, I hate them", "likes": 40, "replies": 12},
            {"url": "https://x.com/b/status/2", "body": "Painful invoicing every single month", "likes": 3}
        ]"#,
    )
    .await
    .unwrap();

    let summary = pipeline
        .import(&ImportRequest {
            path: file,
            topic: "invoicing".to_string(),
            platform: Platform::X,
            analyze: false,
        })
        .await
        .unwrap();

    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.scored, 2);
    assert_eq!(summary.run.platforms, vec![Platform::X]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let stored = pipeline.database().posts_for_topic("invoicing").await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|p| p.cross_query_score == 0.0));
}

#[tokio::test]
async fn test_latest_report_without_runs() {
    let (pipeline, _) = setup(false).await;
    assert_eq!(pipeline.latest_report(None).await.unwrap(), None);
}
