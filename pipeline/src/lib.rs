//! Orchestration of one pain-miner run: fetch, dedup, score, persist,
//! extract, aggregate, report.

use chrono::{DateTime, Utc};
use database::Database;
use llm_interface::{Extractor, GeminiProvider, LlmProvider};
use painminer_core::{
    AggregatedPainPoint, AppConfig, ConfigError, CoreError, ErrorReporter, Platform, PostKey,
    RawPost, Run, ScoredPost, GEMINI_API_KEY_VAR,
};
use platform_clients::{build_adapters, FetchBatch, ImportSource, SearchOverrides, SourceAdapter};
use reporter::{ReportInput, Reporter};
use scoring_engine::{ScoringContext, ScoringEngine};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run: Run,
    /// Posts returned by the adapters, before dedup.
    pub fetched: usize,
    /// Posts that survived dedup and the relevance floor.
    pub scored: usize,
    pub analyzed: usize,
    /// Pain points of the topic after this run.
    pub pain_points: Vec<AggregatedPainPoint>,
    pub report_path: Option<PathBuf>,
}

impl RunSummary {
    pub fn found_nothing(&self) -> bool {
        self.pain_points.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub topic: String,
    pub platforms: Vec<Platform>,
    pub subreddits: Vec<String>,
    pub analyze: bool,
}

#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub path: PathBuf,
    pub topic: String,
    pub platform: Platform,
    pub analyze: bool,
}

pub struct Pipeline<P = GeminiProvider> {
    config: AppConfig,
    engine: ScoringEngine,
    db: Database,
    reporter: Reporter,
    extractor: Option<Extractor<P>>,
    errors: ErrorReporter,
}

impl Pipeline<GeminiProvider> {
    /// Open the configured database and set up Gemini when a key is present.
    pub async fn from_config(config: AppConfig) -> Result<Self, CoreError> {
        let db = Database::connect(&config.database.url).await?;
        let extractor = GeminiProvider::from_config(&config.llm)?
            .map(|provider| Extractor::new(provider, &config.llm));
        Self::new(config, db, extractor)
    }
}

impl<P: LlmProvider> Pipeline<P> {
    pub fn new(
        config: AppConfig,
        db: Database,
        extractor: Option<Extractor<P>>,
    ) -> Result<Self, CoreError> {
        let engine = ScoringEngine::from_config(&config)?;
        let reporter = Reporter::from_config(&config.output);
        Ok(Self {
            config,
            engine,
            db,
            reporter,
            extractor,
            errors: ErrorReporter::new(),
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<RunSummary, CoreError> {
        let overrides = SearchOverrides {
            subreddits: request.subreddits.clone(),
        };
        let adapters = build_adapters(&self.config, &request.platforms, &overrides)?;
        self.search_with(&request.topic, &adapters, request.analyze).await
    }

    /// Run a search over the given adapters.
    pub async fn search_with(
        &self,
        topic: &str,
        adapters: &[Box<dyn SourceAdapter>],
        analyze: bool,
    ) -> Result<RunSummary, CoreError> {
        let platforms: Vec<Platform> = adapters.iter().map(|a| a.platform()).collect();
        info!("Searching {} platform(s) for '{}'", platforms.len(), topic);

        let mut batches = Vec::with_capacity(adapters.len());
        for adapter in adapters {
            match adapter.fetch(topic).await {
                Ok(batch) => {
                    info!(
                        "{}: {} posts from {} queries ({} failed)",
                        batch.platform.display_name(),
                        batch.posts.len(),
                        batch.queries_issued,
                        batch.failed_queries
                    );
                    batches.push(batch);
                }
                Err(e) => {
                    self.errors.report_warning(&e);
                    warn!("Skipping {} for this run", adapter.platform().display_name());
                }
            }
        }

        self.ingest(topic, platforms, batches, analyze).await
    }

    pub async fn import(&self, request: &ImportRequest) -> Result<RunSummary, CoreError> {
        let source = ImportSource::new(request.path.clone(), request.platform);
        let batch = source.fetch(&request.topic).await?;
        info!(
            "Imported {} posts from {}",
            batch.posts.len(),
            request.path.display()
        );
        self.ingest(&request.topic, vec![request.platform], vec![batch], request.analyze)
            .await
    }

    /// Extract pain points from stored posts of `topic` not analyzed yet.
    pub async fn analyze(&self, topic: &str) -> Result<RunSummary, CoreError> {
        let extractor = self.extractor.as_ref().ok_or_else(|| {
            CoreError::from(ConfigError::MissingEnvironmentVariable {
                var_name: GEMINI_API_KEY_VAR.to_string(),
            })
        })?;

        let scoring = self.engine.scorer.config();
        let pending = self
            .db
            .unanalyzed_posts(topic, scoring.min_composite_for_analysis, scoring.max_posts_to_analyze)
            .await?;

        let mut run = Run::start(topic, Vec::new());
        if pending.is_empty() {
            info!("No unanalyzed posts for '{}'; run a search first", topic);
            return Ok(RunSummary {
                run,
                fetched: 0,
                scored: 0,
                analyzed: 0,
                pain_points: self.db.pain_points_for_topic(topic).await?,
                report_path: None,
            });
        }

        run.platforms = platforms_of(&pending);
        run.id = Some(self.db.save_run(&run).await?);
        let now = run.started_at;

        let analyzed = self.extract(extractor, topic, &pending, now).await?;
        let posts = self.db.posts_for_topic(topic).await?;
        self.finish(run, topic, &posts, 0, analyzed).await
    }

    /// The text of the latest report, or `None` when nothing has run yet.
    pub async fn latest_report(&self, topic: Option<&str>) -> Result<Option<String>, CoreError> {
        let Some(run) = self.db.latest_run(topic).await? else {
            return Ok(None);
        };
        let path = run.report_path.ok_or_else(|| CoreError::NotFound {
            resource: format!("report for run {} of '{}'", run.id.unwrap_or_default(), run.topic),
        })?;
        match tokio::fs::read_to_string(Path::new(&path)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CoreError::NotFound { resource: path })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn ingest(
        &self,
        topic: &str,
        platforms: Vec<Platform>,
        batches: Vec<FetchBatch>,
        analyze: bool,
    ) -> Result<RunSummary, CoreError> {
        let mut run = Run::start(topic, platforms);
        run.id = Some(self.db.save_run(&run).await?);
        let now = run.started_at;

        let mut context = ScoringContext::for_topic(topic);
        let mut queries: BTreeMap<Platform, usize> = BTreeMap::new();
        let mut posts: Vec<RawPost> = Vec::new();
        for batch in batches {
            *queries.entry(batch.platform).or_default() += batch.queries_issued;
            posts.extend(batch.posts);
        }
        for (platform, issued) in queries {
            context = context.with_queries(platform, issued);
        }
        let fetched = posts.len();

        let ledger = self.db.load_ledger(self.engine.ledger()).await?;
        let filtered = ledger.filter_unseen(posts, now);
        let admitted: Vec<PostKey> = filtered.admitted.iter().map(RawPost::key).collect();
        if filtered.total_rejected() > 0 {
            debug!("Dedup skipped {} posts: {:?}", filtered.total_rejected(), filtered.rejected);
        }

        let scored = self.engine.scorer.score_batch(&filtered.admitted, &context);
        info!(
            "{} collected, {} new, {} above the relevance floor",
            fetched,
            filtered.admitted.len(),
            scored.len()
        );

        self.db.upsert_posts(topic, &scored, now).await?;
        self.db.mark_seen(&admitted, now).await?;

        let mut analyzed = 0;
        if analyze {
            let shortlist = self.engine.scorer.shortlist(&scored);
            match (&self.extractor, shortlist.is_empty()) {
                (_, true) => info!("No posts above the analysis threshold"),
                (None, false) => warn!(
                    "No {} set, skipping extraction. Pass --no-analyze to silence this.",
                    GEMINI_API_KEY_VAR
                ),
                (Some(extractor), false) => {
                    analyzed = self.extract(extractor, topic, &shortlist, now).await?;
                }
            }
        }

        self.finish(run, topic, &scored, fetched, analyzed).await
    }

    /// Returns how many posts made it through extraction.
    async fn extract(
        &self,
        extractor: &Extractor<P>,
        topic: &str,
        posts: &[ScoredPost],
        now: DateTime<Utc>,
    ) -> Result<usize, CoreError> {
        info!(
            "Running {} extraction on {} posts",
            extractor.provider().name(),
            posts.len()
        );
        let outcome = extractor.extract(topic, posts).await;
        if outcome.failed_batches > 0 {
            warn!(
                "{} of {} extraction batches failed",
                outcome.failed_batches, outcome.batches
            );
        }

        self.db
            .merge_pain_points(topic, &self.engine.aggregator, &outcome.records, now)
            .await?;
        self.db.mark_analyzed(&outcome.analyzed).await?;
        Ok(outcome.analyzed.len())
    }

    async fn finish(
        &self,
        mut run: Run,
        topic: &str,
        posts: &[ScoredPost],
        fetched: usize,
        analyzed: usize,
    ) -> Result<RunSummary, CoreError> {
        let pain_points = self.db.pain_points_for_topic(topic).await?;
        let generated_at = Utc::now();
        let input = ReportInput {
            topic,
            posts,
            analyzed,
            pain_points: &pain_points,
            relevance_floor: self.engine.scorer.config().relevance_floor,
            generated_at,
        };
        let report_path = self.reporter.write(&input).await?;

        run.completed_at = Some(generated_at);
        run.posts_fetched = count(fetched.max(posts.len()));
        run.posts_analyzed = count(analyzed);
        run.pain_points = count(pain_points.len());
        run.report_path = Some(report_path.display().to_string());
        self.db.save_run(&run).await?;

        if pain_points.is_empty() {
            info!("No pain points found for '{}'", topic);
        } else {
            info!("{} pain points for '{}'", pain_points.len(), topic);
        }

        Ok(RunSummary {
            run,
            fetched,
            scored: posts.len(),
            analyzed,
            pain_points,
            report_path: Some(report_path),
        })
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn platforms_of(posts: &[ScoredPost]) -> Vec<Platform> {
    let mut platforms: Vec<Platform> = posts.iter().map(|p| p.post.platform).collect();
    platforms.sort();
    platforms.dedup();
    platforms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platforms_of_is_sorted_and_unique() {
        let posts: Vec<ScoredPost> = [Platform::X, Platform::Hn, Platform::X]
            .iter()
            .enumerate()
            .map(|(i, p)| ScoredPost::zero(RawPost::new(*p, i.to_string())))
            .collect();
        assert_eq!(platforms_of(&posts), vec![Platform::Hn, Platform::X]);
    }

    #[test]
    fn test_summary_reports_empty_result() {
        let summary = RunSummary {
            run: Run::start("topic", vec![]),
            fetched: 3,
            scored: 0,
            analyzed: 0,
            pain_points: vec![],
            report_path: None,
        };
        assert!(summary.found_nothing());
    }
}
