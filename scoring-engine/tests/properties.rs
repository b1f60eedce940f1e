use chrono::{TimeZone, Utc};
use painminer_core::{
    AggregatedPainPoint, AggregationConfig, EvidenceSource, PainPointRecord, Platform, RawPost,
    ScoringConfig,
};
use proptest::prelude::*;
use scoring_engine::{
    token_set, Aggregator, ConfidenceClassifier, Lexicon, Scorer, ScoringContext,
};

const WORDS: &[&str] = &[
    "postman", "pricing", "expensive", "slow", "docker", "builds", "invoice", "export", "csv",
    "broken", "team", "small", "would", "pay", "for", "hate", "sync", "calendar", "api", "tool",
];

fn platform() -> impl Strategy<Value = Platform> {
    prop::sample::select(Platform::ALL.to_vec())
}

fn sentence(max_words: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(WORDS.to_vec()), 1..max_words)
        .prop_map(|words| words.join(" "))
}

fn raw_post() -> impl Strategy<Value = RawPost> {
    (
        platform(),
        "[a-z0-9]{1,8}",
        sentence(12),
        sentence(40),
        any::<i64>(),
        any::<i64>(),
        prop::collection::btree_set("[a-z ]{3,12}", 0..5),
    )
        .prop_map(|(platform, id, title, body, points, comments, queries)| {
            let mut post = RawPost::new(platform, id);
            post.title = title;
            post.body = body;
            post.points = points;
            post.num_comments = comments;
            post.matched_queries = queries;
            post
        })
}

fn record() -> impl Strategy<Value = PainPointRecord> {
    (sentence(6), platform(), 0u32..40, 1u32..8).prop_map(|(description, platform, n, users)| {
        let mut record = PainPointRecord::new(description);
        record.unique_users = users;
        record.sources.push(EvidenceSource {
            url: format!("https://example.com/{n}"),
            platform,
            quote: String::new(),
        });
        record
    })
    .prop_filter("description needs a content word", |r| {
        !token_set(&r.description).is_empty()
    })
}

fn scorer() -> Scorer {
    Scorer::new(ScoringConfig::default(), Lexicon::builtin()).unwrap()
}

fn aggregator(threshold: f64) -> Aggregator {
    Aggregator::new(
        AggregationConfig {
            similarity_threshold: threshold,
        },
        ConfidenceClassifier::default(),
    )
    .unwrap()
}

fn platform_record(description: &str, platform: Platform, url: &str) -> PainPointRecord {
    let mut record = PainPointRecord::new(description);
    record.sources.push(EvidenceSource {
        url: url.to_string(),
        platform,
        quote: String::new(),
    });
    record
}

/// Sorted (canonical description, merge count) pairs.
fn canonical(points: &[AggregatedPainPoint]) -> Vec<(String, u32)> {
    let mut out: Vec<(String, u32)> = points
        .iter()
        .map(|p| (p.description.clone(), p.merge_count))
        .collect();
    out.sort();
    out
}

fn context() -> ScoringContext {
    let mut context = ScoringContext::for_topic("postman api tool");
    for platform in Platform::ALL {
        context = context.with_queries(platform, 4);
    }
    context
}

proptest! {
    #[test]
    fn prop_scoring_is_deterministic(post in raw_post()) {
        let scorer = scorer();
        let context = context();
        let first = scorer.score(&post, &context);
        let second = scorer.score(&post, &context);
        prop_assert_eq!(first.composite_score.to_bits(), second.composite_score.to_bits());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_scores_stay_in_bounds(post in raw_post()) {
        let scored = scorer().score(&post, &context());
        for value in [
            scored.engagement_score,
            scored.pain_score,
            scored.demand_score,
            scored.relevance_score,
            scored.cross_query_score,
        ] {
            prop_assert!((0.0..=1.0).contains(&value), "out of range: {}", value);
        }
        prop_assert!(scored.composite_score >= 0.0);
    }

    #[test]
    fn prop_batch_is_sorted(posts in prop::collection::vec(raw_post(), 0..20)) {
        let ranked = scorer().score_batch(&posts, &ScoringContext::default());
        prop_assert_eq!(ranked.len(), posts.len());
        for pair in ranked.windows(2) {
            prop_assert!(pair[0].composite_score >= pair[1].composite_score);
        }
    }

    #[test]
    fn prop_same_record_twice_is_one_aggregate(record in record()) {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let out = aggregator(0.3)
            .merge_at(Vec::new(), &[record.clone(), record], now)
            .aggregates;
        prop_assert_eq!(out.len(), 1);
        prop_assert_eq!(out[0].merge_count, 2);
    }

    #[test]
    fn prop_raising_threshold_never_merges_a_record_more_readily(
        seeds in prop::collection::vec(record(), 0..15),
        incoming in record(),
        low in 0.0f64..1.0,
        delta in 0.0f64..1.0,
    ) {
        let high = (low + delta).min(1.0);
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let existing = aggregator(0.3).merge_at(Vec::new(), &seeds, now).aggregates;
        let loose = aggregator(low).merge_at(existing.clone(), &[incoming.clone()], now);
        let strict = aggregator(high).merge_at(existing, &[incoming], now);
        prop_assert!(strict.aggregates.len() >= loose.aggregates.len());
        prop_assert!(strict.merged <= loose.merged);
    }

    #[test]
    fn prop_record_strengthens_at_most_one_aggregate(
        seeds in prop::collection::vec(record(), 0..15),
        incoming in record(),
    ) {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let aggregator = aggregator(0.3);
        let existing = aggregator.merge_at(Vec::new(), &seeds, now).aggregates;
        let after = aggregator.merge_at(existing.clone(), &[incoming], now).aggregates;

        prop_assert!(after.len() == existing.len() || after.len() == existing.len() + 1);
        let changed = existing
            .iter()
            .zip(&after)
            .filter(|(before, after)| before.merge_count != after.merge_count)
            .count();
        for (before, after) in existing.iter().zip(&after) {
            prop_assert_eq!(before.id, after.id);
        }
        if after.len() == existing.len() {
            prop_assert_eq!(changed, 1);
        } else {
            prop_assert_eq!(changed, 0);
        }
    }

    #[test]
    fn prop_platform_interleaving_keeps_canonical_descriptions(
        records in prop::collection::vec(record(), 1..20),
    ) {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let aggregator = aggregator(0.3);

        let by_platform: Vec<Vec<PainPointRecord>> = Platform::ALL
            .iter()
            .map(|platform| {
                records
                    .iter()
                    .filter(|r| r.dominant_platform() == Some(*platform))
                    .cloned()
                    .collect()
            })
            .collect();
        // Whole platforms, last platform first.
        let blocked: Vec<PainPointRecord> = by_platform.iter().rev().flatten().cloned().collect();
        // Round robin across platforms.
        let longest = by_platform.iter().map(Vec::len).max().unwrap_or(0);
        let interleaved: Vec<PainPointRecord> = (0..longest)
            .flat_map(|i| by_platform.iter().filter_map(move |group| group.get(i).cloned()))
            .collect();

        let given = aggregator.merge_at(Vec::new(), &records, now).aggregates;
        let a = aggregator.merge_at(Vec::new(), &blocked, now).aggregates;
        let b = aggregator.merge_at(Vec::new(), &interleaved, now).aggregates;
        prop_assert_eq!(canonical(&a), canonical(&given));
        prop_assert_eq!(canonical(&b), canonical(&given));
    }
}

#[test]
fn test_record_near_two_aggregates_does_not_join_them() {
    let out = aggregator(0.3).merge(
        Vec::new(),
        &[
            platform_record("Postman too expensive", Platform::Hn, "https://hn/1"),
            platform_record("Docker desktop too slow", Platform::Reddit, "https://r/1"),
            platform_record(
                "Postman and Docker desktop too slow and expensive",
                Platform::X,
                "https://x.com/1",
            ),
        ],
    );
    assert_eq!(
        canonical(&out),
        vec![
            ("Docker desktop too slow".to_string(), 2),
            ("Postman too expensive".to_string(), 1),
        ]
    );
}

#[test]
fn test_similarity_does_not_drift_through_variants() {
    let out = aggregator(0.3).merge(
        Vec::new(),
        &[
            platform_record("postman pricing expensive", Platform::Reddit, "https://r/1"),
            platform_record(
                "postman pricing expensive teams startups",
                Platform::Reddit,
                "https://r/2",
            ),
            platform_record("teams startups onboarding", Platform::Reddit, "https://r/3"),
        ],
    );
    assert_eq!(
        canonical(&out),
        vec![
            ("postman pricing expensive".to_string(), 2),
            ("teams startups onboarding".to_string(), 1),
        ]
    );
}
