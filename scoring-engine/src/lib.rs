//! Pure scoring, deduplication and aggregation logic. Nothing in this crate
//! performs I/O; callers load state before and persist results after.

pub mod aggregator;
pub mod confidence;
pub mod dedup;
pub mod lexicon;
pub mod scorer;
pub mod text;

pub use aggregator::{AggregationOutcome, Aggregator};
pub use confidence::ConfidenceClassifier;
pub use dedup::{DedupLedger, FilterOutcome, FilterStage, FilterState};
pub use lexicon::Lexicon;
pub use scorer::{rank, select_for_extraction, Scorer, ScoringContext};
pub use text::{jaccard, token_set, tokenize, TopicTerms};

use painminer_core::{AppConfig, ConfigError, DedupConfig};

/// The scorer and aggregator configured from one validated [`AppConfig`].
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    pub scorer: Scorer,
    pub aggregator: Aggregator,
    dedup: DedupConfig,
}

impl ScoringEngine {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let classifier = ConfidenceClassifier::new(config.confidence)?;
        Ok(Self {
            scorer: Scorer::new(config.scoring.clone(), Lexicon::from_config(&config.lexicon))?,
            aggregator: Aggregator::new(config.aggregation, classifier)?,
            dedup: config.dedup,
        })
    }

    /// An empty ledger with the configured age limit; seed it from storage.
    pub fn ledger(&self) -> DedupLedger {
        DedupLedger::from_config(&self.dedup)
    }
}
