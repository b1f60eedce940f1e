use chrono::{TimeZone, Utc};
use painminer_core::{
    AggregatedPainPoint, Category, ConfidenceTier, CrossPlatformStrength, EvidenceSource, Platform,
    RawPost, ScoredPost,
};
use reporter::{ReportInput, Reporter};
use std::collections::{BTreeMap, BTreeSet};

fn post(platform: Platform, id: &str, points: i64, comments: i64, relevance: f64) -> ScoredPost {
    let mut raw = RawPost::new(platform, id);
    raw.title = format!("Why is invoicing so painful {id}");
    raw.body = "I hate chasing clients\nfor payments every month".to_string();
    raw.url = format!("https://example.com/{id}");
    raw.points = points;
    raw.num_comments = comments;
    let mut scored = ScoredPost::zero(raw);
    scored.relevance_score = relevance;
    scored.pain_score = 0.4;
    scored.composite_score = 0.5;
    scored
}

fn point(description: &str, tier: ConfidenceTier, platforms: &[Platform]) -> AggregatedPainPoint {
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    AggregatedPainPoint {
        id: uuid::Uuid::new_v4(),
        description: description.to_string(),
        variants: vec![description.to_string()],
        category: Category::Pricing,
        emotional_intensity: 4,
        payment_signal: true,
        payment_quotes: vec!["I'd pay $20/mo for this".to_string()],
        current_workaround: Some("spreadsheets".to_string()),
        sources: platforms
            .iter()
            .enumerate()
            .map(|(i, p)| EvidenceSource {
                url: format!("https://example.com/source/{i}"),
                platform: *p,
                quote: format!("quote {i}"),
            })
            .collect(),
        platforms: platforms.iter().copied().collect::<BTreeSet<_>>(),
        users_by_platform: BTreeMap::new(),
        unique_users: 3,
        merge_count: platforms.len() as u32,
        confidence_tier: tier,
        cross_platform_strength: if platforms.len() > 1 {
            CrossPlatformStrength::Weak
        } else {
            CrossPlatformStrength::None
        },
        first_seen: now,
        last_seen: now,
    }
}

fn generated_at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap()
}

#[test]
fn test_pain_points_grouped_by_tier() {
    let posts = vec![
        post(Platform::Hn, "1", 120, 45, 0.9),
        post(Platform::Reddit, "2", 30, 12, 0.2),
        post(Platform::X, "3", 5, 1, 0.8),
    ];
    let points = vec![
        point("clients pay invoices late", ConfidenceTier::Low, &[Platform::Hn]),
        point(
            "invoice templates are too rigid",
            ConfidenceTier::High,
            &[Platform::Hn, Platform::Reddit],
        ),
    ];
    let input = ReportInput {
        topic: "Invoicing",
        posts: &posts,
        analyzed: 3,
        pain_points: &points,
        relevance_floor: 0.4,
        generated_at: generated_at(),
    };

    let report = Reporter::new("unused").render(&input);

    assert!(report.starts_with("# Pain Point Research: Invoicing\n"));
    assert!(report.contains("> Generated: 2024-03-01 10:30 | Tool: pain-miner"));
    assert!(report.contains("| Total posts collected | 3 |"));
    assert!(report.contains("| Hacker News posts | 1 |"));
    assert!(report.contains("| X/Twitter posts | 1 |"));
    assert!(!report.contains("Product Hunt posts"));
    assert!(report.contains("| Posts sent to extraction | 3 |"));
    assert!(report.contains("| Pain points identified | 2 |"));
    assert!(report.contains("| Cross-platform pain points | 1 |"));

    let high = report.find("## High Confidence Pain Points").unwrap();
    let low = report.find("## Low Confidence / Emerging Signals").unwrap();
    assert!(high < low);
    assert!(!report.contains("## Medium Confidence"));
    assert!(report.contains("### 1. invoice templates are too rigid"));
    assert!(report.contains("- **Platforms**: Hacker News, Reddit (cross-platform: weak)"));
    assert!(report.contains("  - > \"I'd pay $20/mo for this\""));
    assert!(report.contains("- **Current workaround**: spreadsheets"));
    assert!(report.contains("[hn](https://example.com/source/0)"));

    // Only the relevant, busy HN post qualifies as a discussion hub.
    let hubs = &report[report.find("## High-Engagement Discussion Hubs").unwrap()..];
    assert!(hubs.contains("https://example.com/1"));
    assert!(!hubs.contains("https://example.com/2"));
    assert!(!hubs.contains("https://example.com/3"));
    assert!(!report.contains("No pain points found."));
}

#[test]
fn test_empty_result_lists_top_posts() {
    let posts: Vec<ScoredPost> = (0..25)
        .map(|i| post(Platform::Reddit, &format!("p{i}"), 10, 2, 0.5))
        .collect();
    let input = ReportInput {
        topic: "invoicing",
        posts: &posts,
        analyzed: 0,
        pain_points: &[],
        relevance_floor: 0.4,
        generated_at: generated_at(),
    };

    let report = Reporter::new("unused").render(&input);

    assert!(report.contains("No pain points found."));
    assert!(report.contains("### Top Scored Posts (Rule-Based)"));
    assert!(report.contains("**20. ["));
    assert!(!report.contains("**21. ["));
    assert!(report.contains("- > I hate chasing clients for payments every month..."));
    assert!(!report.contains("## High-Engagement Discussion Hubs"));
}

#[tokio::test]
async fn test_write_creates_output_dir() {
    let dir = std::env::temp_dir()
        .join(format!("pain-miner-report-{}", uuid::Uuid::new_v4()))
        .join("nested");
    let reporter = Reporter::new(&dir);
    let input = ReportInput {
        topic: "Invoice Tools",
        posts: &[],
        analyzed: 0,
        pain_points: &[],
        relevance_floor: 0.4,
        generated_at: generated_at(),
    };

    let path = reporter.write(&input).await.unwrap();

    assert_eq!(path, dir.join("2024-03-01-invoice-tools.md"));
    let written = tokio::fs::read_to_string(&path).await.unwrap();
    assert!(written.contains("No pain points found."));
    assert!(!written.contains("Top Scored Posts"));
}
