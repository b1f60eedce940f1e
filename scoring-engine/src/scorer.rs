//! Rule-based scoring of raw posts.
//!
//! Everything here is a pure function of the post and the scorer's
//! configuration; scores can be recomputed from persisted fields at any time.

use crate::lexicon::Lexicon;
use crate::text::{tokenize, TopicTerms};
use painminer_core::{ConfigError, EngagementCurve, Platform, RawPost, ScoredPost, ScoringConfig};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Text length, in words, that one unit of lexicon density is measured over.
const WORDS_PER_UNIT: f64 = 60.0;
const PAIN_SATURATION: f64 = 3.0;
const DEMAND_SATURATION: f64 = 2.0;

/// What a batch of posts is being scored against.
#[derive(Debug, Clone, Default)]
pub struct ScoringContext {
    pub topic: TopicTerms,
    /// Number of distinct queries issued per platform during the run.
    pub queries_issued: HashMap<Platform, usize>,
}

impl ScoringContext {
    pub fn new(topic: TopicTerms) -> Self {
        Self {
            topic,
            queries_issued: HashMap::new(),
        }
    }

    pub fn for_topic(topic: &str) -> Self {
        Self::new(TopicTerms::from_topic(topic))
    }

    pub fn with_queries(mut self, platform: Platform, issued: usize) -> Self {
        self.queries_issued.insert(platform, issued);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Scorer {
    config: ScoringConfig,
    lexicon: Lexicon,
}

impl Scorer {
    pub fn new(config: ScoringConfig, lexicon: Lexicon) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, lexicon })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(&self, post: &RawPost, context: &ScoringContext) -> ScoredPost {
        if !post.is_well_formed() {
            warn!(
                "Scoring malformed post {} as zero: missing id or text",
                post.key()
            );
            return ScoredPost::zero(post.clone());
        }

        let text = post.searchable_text();
        let word_count = text.split_whitespace().count() as f64;
        let length_units = (word_count / WORDS_PER_UNIT).max(1.0);

        let engagement_score = self.engagement(post);
        let pain_score = (self.lexicon.pain_hits(&text) / length_units / PAIN_SATURATION).min(1.0);
        let demand_score =
            (self.lexicon.demand_hits(&text) / length_units / DEMAND_SATURATION).min(1.0);
        let relevance_score = context.topic.relevance(&tokenize(&text));
        let cross_query_score = cross_query(post, context);

        let weights = &self.config.weights;
        let composite_score = (weights.engagement * engagement_score
            + weights.pain * pain_score
            + weights.demand * demand_score
            + weights.cross_query * cross_query_score)
            .max(0.0);

        ScoredPost {
            post: post.clone(),
            engagement_score,
            pain_score,
            demand_score,
            relevance_score,
            cross_query_score,
            composite_score,
        }
    }

    /// Platform-normalized engagement in [0, 1].
    pub fn engagement(&self, post: &RawPost) -> f64 {
        let curve = self.config.engagement.for_platform(post.platform);
        engagement_on_curve(curve, post.points, post.num_comments)
    }

    /// Score every post, drop those under the relevance floor and rank the
    /// rest by composite score, highest first.
    pub fn score_batch(&self, posts: &[RawPost], context: &ScoringContext) -> Vec<ScoredPost> {
        let mut gated = 0usize;
        let mut scored: Vec<ScoredPost> = posts
            .iter()
            .map(|post| self.score(post, context))
            .filter(|scored| {
                let keep = scored.relevance_score >= self.config.relevance_floor;
                if !keep {
                    gated += 1;
                }
                keep
            })
            .collect();

        if gated > 0 {
            debug!(
                "{} of {} posts fell below relevance floor {:.2}",
                gated,
                posts.len(),
                self.config.relevance_floor
            );
        }

        rank(&mut scored);
        scored
    }

    /// The ranked posts worth sending to extraction under this configuration.
    pub fn shortlist(&self, ranked: &[ScoredPost]) -> Vec<ScoredPost> {
        select_for_extraction(
            ranked,
            self.config.min_composite_for_analysis,
            self.config.max_posts_to_analyze,
        )
    }
}

/// Sort descending by composite score; equal scores fall back to post key so
/// the order never depends on input order.
pub fn rank(scored: &mut [ScoredPost]) {
    scored.sort_by(|a, b| {
        b.composite_score
            .total_cmp(&a.composite_score)
            .then_with(|| a.key().cmp(&b.key()))
    });
}

pub fn select_for_extraction(
    ranked: &[ScoredPost],
    min_composite: f64,
    max_posts: usize,
) -> Vec<ScoredPost> {
    ranked
        .iter()
        .filter(|s| s.composite_score >= min_composite)
        .take(max_posts)
        .cloned()
        .collect()
}

fn saturating_log(value: i64, saturation: f64) -> f64 {
    let value = value.max(0) as f64;
    if saturation <= 0.0 {
        return 0.0;
    }
    (value.ln_1p() / saturation.ln_1p()).clamp(0.0, 1.0)
}

pub fn engagement_on_curve(curve: &EngagementCurve, points: i64, comments: i64) -> f64 {
    let share = curve.points_share.clamp(0.0, 1.0);
    let points = saturating_log(points, curve.points_saturation);
    let comments = saturating_log(comments, curve.comments_saturation);
    (share * points + (1.0 - share) * comments).clamp(0.0, 1.0)
}

fn cross_query(post: &RawPost, context: &ScoringContext) -> f64 {
    let matched = post.matched_queries.len();
    if matched == 0 {
        return 0.0;
    }
    match context.queries_issued.get(&post.platform) {
        Some(&issued) if issued > 0 => (matched as f64 / issued as f64).min(1.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use painminer_core::ScoringWeights;

    fn scorer() -> Scorer {
        Scorer::new(ScoringConfig::default(), Lexicon::builtin()).unwrap()
    }

    fn post(platform: Platform, id: &str, title: &str, body: &str) -> RawPost {
        let mut post = RawPost::new(platform, id);
        post.title = title.to_string();
        post.body = body.to_string();
        post
    }

    #[test]
    fn test_rejects_negative_weights() {
        let mut config = ScoringConfig::default();
        config.weights = ScoringWeights {
            engagement: -1.0,
            ..ScoringWeights::default()
        };
        assert!(Scorer::new(config, Lexicon::builtin()).is_err());
    }

    #[test]
    fn test_malformed_post_scores_zero() {
        let scorer = scorer();
        let context = ScoringContext::for_topic("invoicing");
        let mut empty = post(Platform::Reddit, "abc", "", "   ");
        empty.points = 5000;
        let scored = scorer.score(&empty, &context);
        assert_eq!(scored.composite_score, 0.0);

        let no_id = post(Platform::Reddit, "", "I hate invoicing", "");
        assert_eq!(scorer.score(&no_id, &context).composite_score, 0.0);
    }

    #[test]
    fn test_title_only_post_still_scores_pain() {
        let scorer = scorer();
        let context = ScoringContext::for_topic("invoicing");
        let scored = scorer.score(
            &post(Platform::Hn, "1", "Invoicing is so frustrating and tedious", ""),
            &context,
        );
        assert!(scored.pain_score > 0.0);
        assert_eq!(scored.demand_score, 0.0);
        assert_eq!(scored.relevance_score, 1.0);
    }

    #[test]
    fn test_pain_density_does_not_reward_length() {
        let scorer = scorer();
        let context = ScoringContext::default();
        let short = post(Platform::Hn, "1", "This tool is broken", "");
        let padding = "and then some more words about the weather ".repeat(40);
        let long = post(Platform::Hn, "2", "This tool is broken", &padding);
        assert!(
            scorer.score(&short, &context).pain_score > scorer.score(&long, &context).pain_score
        );
    }

    #[test]
    fn test_engagement_curve_bounds_and_negatives() {
        let curve = EngagementCurve::new(300.0, 150.0, 0.6);
        assert_eq!(engagement_on_curve(&curve, 0, 0), 0.0);
        assert_eq!(engagement_on_curve(&curve, -40, -2), 0.0);
        assert_eq!(engagement_on_curve(&curve, 1_000_000, 1_000_000), 1.0);
        assert!((engagement_on_curve(&curve, 300, 0) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_cross_query_normalized_per_platform() {
        let scorer = scorer();
        let context = ScoringContext::default()
            .with_queries(Platform::Hn, 4)
            .with_queries(Platform::Reddit, 0);
        let mut hn = post(Platform::Hn, "1", "text", "");
        hn.matched_queries = ["a", "b"].iter().map(|s| s.to_string()).collect();
        assert!((scorer.score(&hn, &context).cross_query_score - 0.5).abs() < 1e-9);

        let mut reddit = hn.clone();
        reddit.platform = Platform::Reddit;
        assert_eq!(scorer.score(&reddit, &context).cross_query_score, 0.0);

        let mut x = hn.clone();
        x.platform = Platform::X;
        x.matched_queries.clear();
        assert_eq!(scorer.score(&x, &context).cross_query_score, 0.0);
    }

    #[test]
    fn test_batch_gates_off_topic_and_sorts() {
        let scorer = scorer();
        let context = ScoringContext::for_topic("invoicing");
        let mut loud = post(Platform::Reddit, "off", "I hate my commute, awful and terrible", "");
        loud.points = 5000;
        let mut quiet = post(Platform::Reddit, "a", "Invoicing question", "");
        quiet.points = 1;
        let mut angry = post(Platform::Reddit, "b", "Invoicing is broken and painful", "");
        angry.points = 50;

        let ranked = scorer.score_batch(&[loud, quiet, angry], &context);
        let ids: Vec<&str> = ranked.iter().map(|s| s.post.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_equal_scores_tie_break_by_key() {
        let scorer = scorer();
        let context = ScoringContext::default();
        let a = post(Platform::Reddit, "2", "same text", "");
        let b = post(Platform::Hn, "9", "same text", "");
        let c = post(Platform::Reddit, "1", "same text", "");
        let ranked = scorer.score_batch(&[a, b, c], &context);
        let keys: Vec<String> = ranked.iter().map(|s| s.key().to_string()).collect();
        assert_eq!(keys, vec!["hn:9", "reddit:1", "reddit:2"]);
    }

    #[test]
    fn test_select_for_extraction() {
        let scorer = scorer();
        let context = ScoringContext::default();
        let mut posts = Vec::new();
        for i in 0..5 {
            let mut p = post(Platform::Hn, &i.to_string(), "broken and useless, would pay for a fix", "");
            p.points = 100 * (i + 1);
            posts.push(p);
        }
        posts.push(post(Platform::Hn, "flat", "neutral words", ""));
        let ranked = scorer.score_batch(&posts, &context);
        let picked = select_for_extraction(&ranked, 0.2, 3);
        assert_eq!(picked.len(), 3);
        assert_eq!(picked[0].post.id, "4");
        assert!(picked.iter().all(|s| s.composite_score >= 0.2));
    }
}
