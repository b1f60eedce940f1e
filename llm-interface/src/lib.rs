pub mod gemini;
pub mod parse;
pub mod prompt;

pub use gemini::GeminiProvider;
pub use parse::{parse_records, strip_code_fences, UrlIndex};
pub use prompt::{build_prompt, truncate_chars};

use painminer_core::{CoreError, LlmConfig, PainPointRecord, PostKey, ScoredPost};
use tracing::{info, warn};

#[allow(async_fn_in_trait)]
pub trait LlmProvider {
    fn name(&self) -> &str;

    /// Send one prompt and return the raw text of the reply.
    async fn generate(&self, prompt: &str) -> Result<String, CoreError>;
}

/// What one extraction pass produced.
#[derive(Debug, Default)]
pub struct ExtractionOutcome {
    pub records: Vec<PainPointRecord>,
    pub batches: usize,
    pub failed_batches: usize,
    /// Posts that were part of a batch that came back parseable.
    pub analyzed: Vec<PostKey>,
}

/// Batches scored posts through an [`LlmProvider`] and collects the records.
pub struct Extractor<P> {
    provider: P,
    batch_size: usize,
    max_body_chars: usize,
}

impl<P: LlmProvider> Extractor<P> {
    pub fn new(provider: P, config: &LlmConfig) -> Self {
        Self {
            provider,
            batch_size: config.batch_size.max(1),
            max_body_chars: config.max_body_chars,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// A failed batch is logged and skipped; the others still yield records.
    pub async fn extract(&self, topic: &str, posts: &[ScoredPost]) -> ExtractionOutcome {
        let mut outcome = ExtractionOutcome::default();
        let total = posts.len().div_ceil(self.batch_size);

        for (index, batch) in posts.chunks(self.batch_size).enumerate() {
            outcome.batches += 1;
            info!(
                "[{}] Analyzing batch {}/{} ({} posts)",
                self.provider.name(),
                index + 1,
                total,
                batch.len()
            );

            match self.run_batch(topic, batch).await {
                Ok(records) => {
                    info!("[{}] Found {} pain points in batch {}", self.provider.name(), records.len(), index + 1);
                    outcome.records.extend(records);
                    outcome.analyzed.extend(batch.iter().map(ScoredPost::key));
                }
                Err(e) => {
                    warn!("[{}] Batch {} failed: {}", self.provider.name(), index + 1, e);
                    outcome.failed_batches += 1;
                }
            }
        }
        outcome
    }

    async fn run_batch(&self, topic: &str, batch: &[ScoredPost]) -> Result<Vec<PainPointRecord>, CoreError> {
        let prompt = build_prompt(topic, batch, self.max_body_chars)?;
        let response = self.provider.generate(&prompt).await?;
        let urls = UrlIndex::new(batch.iter().map(|p| (p.post.url.as_str(), p.post.platform)));
        parse_records(&response, &urls).map_err(|e| {
            warn!("Unparseable reply: {}", truncate_chars(&response, 500));
            CoreError::from(e)
        })
    }
}
