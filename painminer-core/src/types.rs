use crate::error::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Community platforms posts can be fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[serde(alias = "hackernews")]
    Hn,
    Reddit,
    #[serde(alias = "product_hunt")]
    ProductHunt,
    #[serde(alias = "twitter")]
    X,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Hn,
        Platform::Reddit,
        Platform::ProductHunt,
        Platform::X,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Hn => "hn",
            Platform::Reddit => "reddit",
            Platform::ProductHunt => "producthunt",
            Platform::X => "x",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Hn => "Hacker News",
            Platform::Reddit => "Reddit",
            Platform::ProductHunt => "Product Hunt",
            Platform::X => "X/Twitter",
        }
    }

    /// Guess the platform a link points at from its host.
    pub fn from_url(link: &str) -> Option<Platform> {
        let parsed = url::Url::parse(link.trim()).ok()?;
        let host = parsed.host_str()?.trim_start_matches("www.");
        match host {
            "news.ycombinator.com" | "hn.algolia.com" => Some(Platform::Hn),
            h if h == "reddit.com" || h.ends_with(".reddit.com") || h == "redd.it" => {
                Some(Platform::Reddit)
            }
            "producthunt.com" => Some(Platform::ProductHunt),
            "x.com" | "twitter.com" | "mobile.twitter.com" => Some(Platform::X),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hn" | "hackernews" => Ok(Platform::Hn),
            "reddit" => Ok(Platform::Reddit),
            "producthunt" | "product_hunt" | "ph" => Ok(Platform::ProductHunt),
            "x" | "twitter" => Ok(Platform::X),
            other => Err(CoreError::InvalidInput {
                message: format!("unknown platform '{other}'"),
            }),
        }
    }
}

/// Normalize a link for identity comparisons.
///
/// Drops the fragment, `utm_*` tracking parameters and a trailing slash.
/// Unparseable input is returned trimmed; blank input yields `None`.
pub fn canonical_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Ok(mut parsed) = url::Url::parse(trimmed) else {
        return Some(trimmed.to_string());
    };

    parsed.set_fragment(None);
    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !k.starts_with("utm_"))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }

    let mut out = parsed.to_string();
    if out.ends_with('/') && parsed.path() != "/" {
        out.pop();
    }
    Some(out)
}

/// Canonical identity of a post: ids are only unique within a platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PostKey {
    pub platform: Platform,
    pub id: String,
}

impl PostKey {
    pub fn new(platform: Platform, id: impl Into<String>) -> Self {
        Self {
            platform,
            id: id.into(),
        }
    }
}

impl fmt::Display for PostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.platform, self.id)
    }
}

/// A post or comment as normalized by a fetch adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPost {
    pub id: String,
    pub platform: Platform,
    #[serde(default)]
    pub community: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub num_comments: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub matched_queries: BTreeSet<String>,
}

impl RawPost {
    pub fn new(platform: Platform, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            platform,
            community: platform.as_str().to_string(),
            title: String::new(),
            body: String::new(),
            author: String::new(),
            url: String::new(),
            points: 0,
            num_comments: 0,
            created_at: None,
            matched_queries: BTreeSet::new(),
        }
    }

    pub fn key(&self) -> PostKey {
        PostKey::new(self.platform, self.id.clone())
    }

    /// Lowercased title and body, the text every lexicon is matched against.
    pub fn searchable_text(&self) -> String {
        let mut text = String::with_capacity(self.title.len() + self.body.len() + 1);
        text.push_str(&self.title);
        if !self.body.is_empty() {
            text.push(' ');
            text.push_str(&self.body);
        }
        text.to_lowercase()
    }

    /// A post needs an id and some text before it can be scored.
    pub fn is_well_formed(&self) -> bool {
        !self.id.trim().is_empty()
            && !(self.title.trim().is_empty() && self.body.trim().is_empty())
    }
}

/// A raw post plus the rule-based scores derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPost {
    pub post: RawPost,
    pub engagement_score: f64,
    pub pain_score: f64,
    pub demand_score: f64,
    pub relevance_score: f64,
    pub cross_query_score: f64,
    pub composite_score: f64,
}

impl ScoredPost {
    pub fn zero(post: RawPost) -> Self {
        Self {
            post,
            engagement_score: 0.0,
            pain_score: 0.0,
            demand_score: 0.0,
            relevance_score: 0.0,
            cross_query_score: 0.0,
            composite_score: 0.0,
        }
    }

    pub fn key(&self) -> PostKey {
        self.post.key()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    MissingFeature,
    Pricing,
    WorkflowFriction,
    IntegrationNeed,
    QualityIssue,
    LearningCurve,
    #[default]
    #[serde(other)]
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::MissingFeature => "missing_feature",
            Category::Pricing => "pricing",
            Category::WorkflowFriction => "workflow_friction",
            Category::IntegrationNeed => "integration_need",
            Category::QualityIssue => "quality_issue",
            Category::LearningCurve => "learning_curve",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A copied piece of evidence. Never a reference back to the post it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceSource {
    pub url: String,
    pub platform: Platform,
    #[serde(default)]
    pub quote: String,
}

fn default_intensity() -> u8 {
    1
}

fn default_users() -> u32 {
    1
}

/// One pain point as produced by a single extraction batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PainPointRecord {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default = "default_intensity")]
    pub emotional_intensity: u8,
    #[serde(default)]
    pub payment_signal: bool,
    #[serde(default)]
    pub payment_quote: Option<String>,
    #[serde(default)]
    pub current_workaround: Option<String>,
    #[serde(default)]
    pub sources: Vec<EvidenceSource>,
    #[serde(default = "default_users")]
    pub unique_users: u32,
}

impl PainPointRecord {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            category: Category::Other,
            emotional_intensity: 1,
            payment_signal: false,
            payment_quote: None,
            current_workaround: None,
            sources: Vec::new(),
            unique_users: 1,
        }
    }

    pub fn intensity(&self) -> u8 {
        self.emotional_intensity.clamp(1, 5)
    }

    pub fn users(&self) -> u32 {
        self.unique_users.max(1)
    }

    /// The platform contributing the most sources; ties go to the one cited first.
    pub fn dominant_platform(&self) -> Option<Platform> {
        let mut counts: Vec<(Platform, usize)> = Vec::new();
        for source in &self.sources {
            match counts.iter_mut().find(|(p, _)| *p == source.platform) {
                Some((_, n)) => *n += 1,
                None => counts.push((source.platform, 1)),
            }
        }
        let mut best: Option<(Platform, usize)> = None;
        for (platform, n) in counts {
            if best.map_or(true, |(_, m)| n > m) {
                best = Some((platform, n));
            }
        }
        best.map(|(p, _)| p)
    }
}

/// Ordered low < medium < high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    #[default]
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::Low => "low",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::High => "high",
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfidenceTier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(ConfidenceTier::Low),
            "medium" => Ok(ConfidenceTier::Medium),
            "high" => Ok(ConfidenceTier::High),
            other => Err(CoreError::InvalidInput {
                message: format!("unknown confidence tier '{other}'"),
            }),
        }
    }
}

/// Ordered none < weak < moderate < strong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossPlatformStrength {
    #[default]
    None,
    Weak,
    Moderate,
    Strong,
}

impl CrossPlatformStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrossPlatformStrength::None => "none",
            CrossPlatformStrength::Weak => "weak",
            CrossPlatformStrength::Moderate => "moderate",
            CrossPlatformStrength::Strong => "strong",
        }
    }
}

impl fmt::Display for CrossPlatformStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key used in `users_by_platform` for records that cite no source.
pub const UNATTRIBUTED_USERS: &str = "unattributed";

/// The canonical, merged pain point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPainPoint {
    pub id: Uuid,
    pub description: String,
    /// Every distinct description folded into this point, canonical first.
    #[serde(default)]
    pub variants: Vec<String>,
    pub category: Category,
    pub emotional_intensity: u8,
    pub payment_signal: bool,
    #[serde(default)]
    pub payment_quotes: Vec<String>,
    pub current_workaround: Option<String>,
    pub sources: Vec<EvidenceSource>,
    pub platforms: BTreeSet<Platform>,
    /// Largest `unique_users` seen per contributing platform.
    #[serde(default)]
    pub users_by_platform: BTreeMap<String, u32>,
    pub unique_users: u32,
    pub merge_count: u32,
    pub confidence_tier: ConfidenceTier,
    pub cross_platform_strength: CrossPlatformStrength,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl AggregatedPainPoint {
    pub fn payment_quote(&self) -> Option<&str> {
        self.payment_quotes.first().map(String::as_str)
    }

    pub fn is_cross_platform(&self) -> bool {
        self.platforms.len() >= 2
    }
}

/// Bookkeeping for one invocation of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: Option<i64>,
    pub topic: String,
    pub platforms: Vec<Platform>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub posts_fetched: u32,
    pub posts_analyzed: u32,
    pub pain_points: u32,
    pub report_path: Option<String>,
}

impl Run {
    pub fn start(topic: impl Into<String>, platforms: Vec<Platform>) -> Self {
        Self {
            id: None,
            topic: topic.into(),
            platforms,
            started_at: Utc::now(),
            completed_at: None,
            posts_fetched: 0,
            posts_analyzed: 0,
            pain_points: 0,
            report_path: None,
        }
    }

    pub fn elapsed(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|done| done - self.started_at)
    }
}
