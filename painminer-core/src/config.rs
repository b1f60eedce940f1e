//! Application configuration.
//!
//! Settings are read from a TOML file where every field is optional, then
//! secrets are overlaid from the environment. [`AppConfig::validate`] must run
//! before any value reaches the scoring engine; an invalid configuration is
//! fatal at startup.

use crate::error::{ConfigError, CoreError};
use crate::types::Platform;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_CONFIG_PATH: &str = "pain-miner.toml";

pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const PRODUCTHUNT_TOKEN_VAR: &str = "PRODUCTHUNT_TOKEN";
pub const X_BEARER_TOKEN_VAR: &str = "X_BEARER_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scoring: ScoringConfig,
    pub lexicon: LexiconConfig,
    pub aggregation: AggregationConfig,
    pub confidence: ConfidenceConfig,
    pub dedup: DedupConfig,
    pub platforms: PlatformsConfig,
    pub search: SearchConfig,
    pub llm: LlmConfig,
    pub output: OutputConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    /// Posts whose topic relevance falls below this are excluded from ranking.
    pub relevance_floor: f64,
    pub min_composite_for_analysis: f64,
    pub max_posts_to_analyze: usize,
    pub engagement: EngagementCurves,
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        check_unit_interval("scoring.relevance_floor", self.relevance_floor)?;
        check_unit_interval(
            "scoring.min_composite_for_analysis",
            self.min_composite_for_analysis,
        )?;
        for platform in Platform::ALL {
            self.engagement.for_platform(platform).validate(platform)?;
        }
        Ok(())
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            relevance_floor: 0.4,
            min_composite_for_analysis: 0.2,
            max_posts_to_analyze: 50,
            engagement: EngagementCurves::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub engagement: f64,
    pub pain: f64,
    pub demand: f64,
    pub cross_query: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            engagement: 0.3,
            pain: 0.3,
            demand: 0.25,
            cross_query: 0.15,
        }
    }
}

impl ScoringWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let named = [
            ("scoring.weights.engagement", self.engagement),
            ("scoring.weights.pain", self.pain),
            ("scoring.weights.demand", self.demand),
            ("scoring.weights.cross_query", self.cross_query),
        ];
        for (field, weight) in named {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::invalid(field, weight));
            }
        }
        if named.iter().all(|(_, w)| *w == 0.0) {
            return Err(ConfigError::ValidationFailed {
                reason: "at least one scoring weight must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Maps a platform's raw engagement numbers into [0, 1].
///
/// Both counts are log-scaled against the value at which they saturate, then
/// blended: `points_share * points + (1 - points_share) * comments`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngagementCurve {
    pub points_saturation: f64,
    pub comments_saturation: f64,
    pub points_share: f64,
}

impl EngagementCurve {
    pub const fn new(points_saturation: f64, comments_saturation: f64, points_share: f64) -> Self {
        Self {
            points_saturation,
            comments_saturation,
            points_share,
        }
    }

    fn validate(&self, platform: Platform) -> Result<(), ConfigError> {
        let prefix = format!("scoring.engagement.{platform}");
        if !self.points_saturation.is_finite() || self.points_saturation <= 0.0 {
            return Err(ConfigError::invalid(
                format!("{prefix}.points_saturation"),
                self.points_saturation,
            ));
        }
        if !self.comments_saturation.is_finite() || self.comments_saturation <= 0.0 {
            return Err(ConfigError::invalid(
                format!("{prefix}.comments_saturation"),
                self.comments_saturation,
            ));
        }
        if !(0.0..=1.0).contains(&self.points_share) {
            return Err(ConfigError::invalid(
                format!("{prefix}.points_share"),
                self.points_share,
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementCurves {
    pub hn: EngagementCurve,
    pub reddit: EngagementCurve,
    pub producthunt: EngagementCurve,
    pub x: EngagementCurve,
}

impl Default for EngagementCurves {
    fn default() -> Self {
        Self {
            // HN points are scarce; a few hundred is a front-page thread.
            hn: EngagementCurve::new(300.0, 150.0, 0.6),
            reddit: EngagementCurve::new(2000.0, 400.0, 0.6),
            producthunt: EngagementCurve::new(800.0, 80.0, 0.7),
            // Likes plus retweets inflate quickly.
            x: EngagementCurve::new(5000.0, 300.0, 0.7),
        }
    }
}

impl EngagementCurves {
    pub fn for_platform(&self, platform: Platform) -> &EngagementCurve {
        match platform {
            Platform::Hn => &self.hn,
            Platform::Reddit => &self.reddit,
            Platform::ProductHunt => &self.producthunt,
            Platform::X => &self.x,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LexiconConfig {
    pub extra_pain_words: Vec<String>,
    pub extra_demand_phrases: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub similarity_threshold: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.3,
        }
    }
}

/// Step-function thresholds for the confidence classifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Two platforms with at most this many merges are a weak corroboration.
    pub weak_max_merges: u32,
    /// Three or more platforms with at least this many merges are strong.
    pub strong_min_merges: u32,
    pub medium_min_merges: u32,
    pub medium_min_intensity: u8,
    /// Single-platform points need this many merges and a payment signal for high.
    pub high_volume_min_merges: u32,
}

impl ConfidenceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strong_min_merges <= self.weak_max_merges {
            return Err(ConfigError::ValidationFailed {
                reason: format!(
                    "confidence.strong_min_merges ({}) must exceed confidence.weak_max_merges ({})",
                    self.strong_min_merges, self.weak_max_merges
                ),
            });
        }
        if !(1..=5).contains(&self.medium_min_intensity) {
            return Err(ConfigError::invalid(
                "confidence.medium_min_intensity",
                self.medium_min_intensity,
            ));
        }
        Ok(())
    }
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            weak_max_merges: 3,
            strong_min_merges: 4,
            medium_min_merges: 2,
            medium_min_intensity: 4,
            high_volume_min_merges: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub max_post_age_days: u32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            max_post_age_days: 180,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformsConfig {
    pub hn: HnConfig,
    pub reddit: RedditConfig,
    pub producthunt: ProductHuntConfig,
    pub x: XConfig,
}

impl PlatformsConfig {
    pub fn is_enabled(&self, platform: Platform) -> bool {
        match platform {
            Platform::Hn => self.hn.enabled,
            Platform::Reddit => self.reddit.enabled,
            Platform::ProductHunt => self.producthunt.enabled,
            Platform::X => self.x.enabled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HnConfig {
    pub enabled: bool,
    pub hits_per_query: u32,
    pub min_points: u32,
}

impl Default for HnConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hits_per_query: 30,
            min_points: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub enabled: bool,
    pub user_agent: String,
    pub default_subreddits: Vec<String>,
    pub sort: String,
    pub time_filter: String,
    pub limit: u32,
    pub comment_threshold: i64,
    /// Reddit throttles anonymous clients harder than the global delay.
    pub min_query_delay_ms: u64,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            user_agent: "pain-miner/1.0".to_string(),
            default_subreddits: vec![
                "SaaS".to_string(),
                "startups".to_string(),
                "Entrepreneur".to_string(),
            ],
            sort: "top".to_string(),
            time_filter: "month".to_string(),
            limit: 100,
            comment_threshold: 10,
            min_query_delay_ms: 1500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductHuntConfig {
    pub enabled: bool,
    pub developer_token: Option<String>,
    pub max_pages_per_topic: u32,
    pub min_comments_to_fetch: i64,
}

impl Default for ProductHuntConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            developer_token: None,
            max_pages_per_topic: 3,
            min_comments_to_fetch: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XConfig {
    pub enabled: bool,
    pub bearer_token: Option<String>,
    pub max_results_per_query: u32,
}

impl Default for XConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bearer_token: None,
            max_results_per_query: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub query_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            query_delay_ms: 300,
            request_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub batch_size: usize,
    pub max_body_chars: usize,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            batch_size: 25,
            max_body_chars: 2000,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./output"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/pain_miner.db".to_string(),
        }
    }
}

fn check_unit_interval(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, value))
    }
}

impl AppConfig {
    /// Load the configuration file (if any), overlay environment secrets and validate.
    ///
    /// An explicitly requested path must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound {
                        path: path.display().to_string(),
                    }
                    .into());
                }
                Self::from_file(path)?
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    debug!("No {} found, using defaults", DEFAULT_CONFIG_PATH);
                    Self::default()
                }
            }
        };

        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&raw)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Overlay secrets; environment values win over the file.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(GEMINI_API_KEY_VAR) {
            self.llm.api_key = Some(key);
        }
        if let Some(token) = non_empty(PRODUCTHUNT_TOKEN_VAR) {
            self.platforms.producthunt.developer_token = Some(token);
        }
        if let Some(token) = non_empty(X_BEARER_TOKEN_VAR) {
            self.platforms.x.bearer_token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring.validate()?;

        check_unit_interval(
            "aggregation.similarity_threshold",
            self.aggregation.similarity_threshold,
        )?;

        self.confidence.validate()?;

        if self.dedup.max_post_age_days == 0 {
            return Err(ConfigError::invalid("dedup.max_post_age_days", 0));
        }
        if self.llm.batch_size == 0 {
            return Err(ConfigError::invalid("llm.batch_size", 0));
        }
        Ok(())
    }
}
