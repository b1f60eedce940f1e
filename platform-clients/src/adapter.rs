use async_trait::async_trait;
use painminer_core::{CoreError, Platform, RawPost};
use std::collections::BTreeMap;

/// Posts one adapter produced for a topic, plus how many distinct queries it
/// issued (the denominator for cross-query scoring).
#[derive(Debug, Clone)]
pub struct FetchBatch {
    pub platform: Platform,
    pub posts: Vec<RawPost>,
    pub queries_issued: usize,
    pub failed_queries: usize,
}

impl FetchBatch {
    pub fn empty(platform: Platform) -> Self {
        Self {
            platform,
            posts: Vec::new(),
            queries_issued: 0,
            failed_queries: 0,
        }
    }
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Fetch candidate posts for `topic`. Individual query failures are
    /// logged and counted; only setup problems are returned as errors.
    async fn fetch(&self, topic: &str) -> Result<FetchBatch, CoreError>;
}

pub fn render_queries(templates: &[&str], topic: &str) -> Vec<String> {
    templates
        .iter()
        .map(|t| t.replace("{topic}", topic.trim()))
        .collect()
}

/// Append `items` to `body` under a `marker` line, joined by `separator`.
pub fn append_section(body: &mut String, marker: &str, items: &[String], separator: &str) {
    if items.is_empty() {
        return;
    }
    body.push_str(marker);
    body.push_str(&items.join(separator));
}

/// Accumulates posts by id, unioning the queries that found each one.
#[derive(Debug, Default)]
pub struct PostCollector {
    posts: BTreeMap<String, RawPost>,
    order: Vec<String>,
}

impl PostCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `post` or, if its id is known, just record the extra query.
    pub fn add(&mut self, post: RawPost, query: &str) {
        match self.posts.get_mut(&post.id) {
            Some(existing) => {
                existing.matched_queries.insert(query.to_string());
            }
            None => {
                let mut post = post;
                post.matched_queries.insert(query.to_string());
                self.order.push(post.id.clone());
                self.posts.insert(post.id.clone(), post);
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.posts.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Posts in first-seen order.
    pub fn into_posts(mut self) -> Vec<RawPost> {
        self.order
            .iter()
            .filter_map(|id| self.posts.remove(id))
            .collect()
    }
}
