//! Ledger of posts already processed, plus the ordered filter pipeline that
//! decides which fetched posts are worth scoring.

use chrono::{DateTime, Duration, Utc};
use painminer_core::{DedupConfig, Platform, PostKey, RawPost};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct DedupLedger {
    seen: HashMap<PostKey, DateTime<Utc>>,
    max_age: Duration,
}

impl DedupLedger {
    pub fn new(max_age: Duration) -> Self {
        Self {
            seen: HashMap::new(),
            max_age,
        }
    }

    pub fn from_config(config: &DedupConfig) -> Self {
        Self::new(Duration::days(i64::from(config.max_post_age_days)))
    }

    /// Seed the ledger with history loaded from storage.
    pub fn with_entries<I>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (PostKey, DateTime<Utc>)>,
    {
        for (key, processed_at) in entries {
            self.seen.entry(key).or_insert(processed_at);
        }
        self
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn has_seen(&self, platform: Platform, id: &str) -> bool {
        self.seen.contains_key(&PostKey::new(platform, id))
    }

    /// Record a post as processed. Returns `false` if it was already known;
    /// the original timestamp is kept in that case.
    pub fn mark_seen(&mut self, platform: Platform, id: &str, processed_at: DateTime<Utc>) -> bool {
        let key = PostKey::new(platform, id);
        if self.seen.contains_key(&key) {
            return false;
        }
        self.seen.insert(key, processed_at);
        true
    }

    pub fn processed_at(&self, platform: Platform, id: &str) -> Option<DateTime<Utc>> {
        self.seen.get(&PostKey::new(platform, id)).copied()
    }

    /// Run every post through the filter stages in order, keeping the first
    /// occurrence of each admitted key.
    pub fn filter_unseen(&self, posts: Vec<RawPost>, now: DateTime<Utc>) -> FilterOutcome {
        let stages = default_stages();
        let total = posts.len();
        let mut batch: HashSet<PostKey> = HashSet::new();
        let mut admitted = Vec::with_capacity(posts.len());
        let mut rejected: Vec<(&'static str, usize)> =
            stages.iter().map(|s| (s.name(), 0)).collect();

        for post in posts {
            let state = FilterState {
                ledger: self,
                batch: &batch,
                now,
            };
            let rejection = stages
                .iter()
                .position(|stage| !stage.admit(&post, &state));
            match rejection {
                Some(index) => {
                    debug!("{} rejected by {}", post.key(), stages[index].name());
                    rejected[index].1 += 1;
                }
                None => {
                    batch.insert(post.key());
                    admitted.push(post);
                }
            }
        }

        let outcome = FilterOutcome { admitted, rejected };
        info!(
            "Dedup kept {} of {} posts ({})",
            outcome.admitted.len(),
            total,
            outcome.summary()
        );
        outcome
    }
}

/// Everything a stage may consult when judging one post.
pub struct FilterState<'a> {
    pub ledger: &'a DedupLedger,
    /// Keys already admitted earlier in the same batch.
    pub batch: &'a HashSet<PostKey>,
    pub now: DateTime<Utc>,
}

pub trait FilterStage {
    fn name(&self) -> &'static str;
    fn admit(&self, post: &RawPost, state: &FilterState<'_>) -> bool;
}

pub struct WellFormed;

impl FilterStage for WellFormed {
    fn name(&self) -> &'static str {
        "malformed"
    }

    fn admit(&self, post: &RawPost, _state: &FilterState<'_>) -> bool {
        post.is_well_formed()
    }
}

pub struct WithinBatch;

impl FilterStage for WithinBatch {
    fn name(&self) -> &'static str {
        "duplicate"
    }

    fn admit(&self, post: &RawPost, state: &FilterState<'_>) -> bool {
        !state.batch.contains(&post.key())
    }
}

/// Stale discussions count as seen even on first encounter. Posts without a
/// timestamp cannot be judged and are let through.
pub struct MaxAge;

impl FilterStage for MaxAge {
    fn name(&self) -> &'static str {
        "too_old"
    }

    fn admit(&self, post: &RawPost, state: &FilterState<'_>) -> bool {
        match post.created_at {
            Some(created) => state.now - created <= state.ledger.max_age,
            None => true,
        }
    }
}

pub struct History;

impl FilterStage for History {
    fn name(&self) -> &'static str {
        "seen"
    }

    fn admit(&self, post: &RawPost, state: &FilterState<'_>) -> bool {
        !state.ledger.has_seen(post.platform, &post.id)
    }
}

pub fn default_stages() -> Vec<Box<dyn FilterStage>> {
    vec![
        Box::new(WellFormed),
        Box::new(WithinBatch),
        Box::new(MaxAge),
        Box::new(History),
    ]
}

#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub admitted: Vec<RawPost>,
    /// Rejection count per stage, in stage order.
    pub rejected: Vec<(&'static str, usize)>,
}

impl FilterOutcome {
    pub fn rejected_by(&self, stage: &str) -> usize {
        self.rejected
            .iter()
            .find(|(name, _)| *name == stage)
            .map_or(0, |(_, n)| *n)
    }

    pub fn total_rejected(&self) -> usize {
        self.rejected.iter().map(|(_, n)| n).sum()
    }

    fn summary(&self) -> String {
        self.rejected
            .iter()
            .map(|(name, n)| format!("{name}={n}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
