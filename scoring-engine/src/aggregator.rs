//! Folds extracted pain-point records into a running set of canonical
//! aggregates.
//!
//! A record is compared only against each aggregate's canonical description,
//! the description of the record that created it. It joins the single most
//! similar aggregate at or above the threshold; ties go to the aggregate with
//! the higher merge count, then to the one created first. Other matches are
//! left untouched, and nothing is ever split or consolidated afterwards.
//! Variants are kept for display and never take part in matching.
//!
//! Records are processed grouped by dominant platform in `Platform` order,
//! keeping their relative order within a platform, with unattributed
//! records last. Interleaving platforms in the input therefore has no
//! effect. The order within one platform does matter: it decides which
//! description becomes canonical, and with that how later records group.

use crate::confidence::ConfidenceClassifier;
use crate::text::{jaccard, token_set};
use chrono::{DateTime, Utc};
use painminer_core::{
    canonical_url, AggregatedPainPoint, AggregationConfig, Category, ConfigError,
    CrossPlatformStrength, ConfidenceTier, EvidenceSource, PainPointRecord, UNATTRIBUTED_USERS,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct AggregationOutcome {
    pub aggregates: Vec<AggregatedPainPoint>,
    pub created: usize,
    pub merged: usize,
    pub skipped: usize,
}

struct Slot {
    point: AggregatedPainPoint,
    /// Tokens of the canonical description.
    signature: HashSet<String>,
}

impl Slot {
    fn new(mut point: AggregatedPainPoint) -> Self {
        if point.variants.is_empty() {
            point.variants.push(point.description.clone());
        }
        let signature = token_set(&point.description);
        Self { point, signature }
    }

    fn similarity(&self, tokens: &HashSet<String>) -> f64 {
        jaccard(&self.signature, tokens)
    }

    fn add_variant(&mut self, description: &str) {
        let known = self
            .point
            .variants
            .iter()
            .any(|v| v.eq_ignore_ascii_case(description));
        if !known {
            self.point.variants.push(description.to_string());
        }
    }
}

#[derive(Debug, Clone)]
pub struct Aggregator {
    threshold: f64,
    classifier: ConfidenceClassifier,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self {
            threshold: AggregationConfig::default().similarity_threshold,
            classifier: ConfidenceClassifier::default(),
        }
    }
}

impl Aggregator {
    pub fn new(
        config: AggregationConfig,
        classifier: ConfidenceClassifier,
    ) -> Result<Self, ConfigError> {
        let threshold = config.similarity_threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::invalid(
                "aggregation.similarity_threshold",
                threshold,
            ));
        }
        Ok(Self {
            threshold,
            classifier,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn classifier(&self) -> &ConfidenceClassifier {
        &self.classifier
    }

    pub fn merge(
        &self,
        existing: Vec<AggregatedPainPoint>,
        incoming: &[PainPointRecord],
    ) -> Vec<AggregatedPainPoint> {
        self.merge_at(existing, incoming, Utc::now()).aggregates
    }

    pub fn merge_at(
        &self,
        existing: Vec<AggregatedPainPoint>,
        incoming: &[PainPointRecord],
        now: DateTime<Utc>,
    ) -> AggregationOutcome {
        let mut slots: Vec<Slot> = existing.into_iter().map(Slot::new).collect();
        let mut outcome = AggregationOutcome::default();

        let mut ordered: Vec<&PainPointRecord> = incoming.iter().collect();
        ordered.sort_by_key(|r| {
            let platform = r.dominant_platform();
            (platform.is_none(), platform)
        });

        for record in ordered {
            let description = record.description.trim();
            let tokens = token_set(description);
            if tokens.is_empty() {
                warn!("Skipping pain point record without a usable description");
                outcome.skipped += 1;
                continue;
            }

            let best = slots
                .iter()
                .enumerate()
                .map(|(i, slot)| (i, slot.similarity(&tokens)))
                .filter(|(_, sim)| *sim >= self.threshold)
                .min_by(|a, b| {
                    b.1.total_cmp(&a.1)
                        .then_with(|| {
                            slots[b.0].point.merge_count.cmp(&slots[a.0].point.merge_count)
                        })
                        .then_with(|| a.0.cmp(&b.0))
                });

            match best {
                Some((target, sim)) => {
                    debug!(
                        "Merging \"{}\" into \"{}\" (similarity {:.2})",
                        description, slots[target].point.description, sim
                    );
                    fold_record(&mut slots[target], record, description, now);
                    outcome.merged += 1;
                }
                None => {
                    let mut slot = Slot::new(seed(record, description, now));
                    fold_record(&mut slot, record, description, now);
                    debug!("New pain point: {}", slot.point.description);
                    slots.push(slot);
                    outcome.created += 1;
                }
            }
        }

        outcome.aggregates = slots
            .into_iter()
            .map(|slot| {
                let mut point = slot.point;
                self.classifier.apply(&mut point);
                point
            })
            .collect();

        info!(
            "Aggregated {} records: {} new, {} merged, {} skipped; {} pain points",
            incoming.len(),
            outcome.created,
            outcome.merged,
            outcome.skipped,
            outcome.aggregates.len()
        );
        outcome
    }
}

fn seed(record: &PainPointRecord, description: &str, now: DateTime<Utc>) -> AggregatedPainPoint {
    AggregatedPainPoint {
        id: Uuid::new_v4(),
        description: description.to_string(),
        variants: vec![description.to_string()],
        category: record.category,
        emotional_intensity: record.intensity(),
        payment_signal: false,
        payment_quotes: Vec::new(),
        current_workaround: None,
        sources: Vec::new(),
        platforms: BTreeSet::new(),
        users_by_platform: BTreeMap::new(),
        unique_users: 0,
        merge_count: 0,
        confidence_tier: ConfidenceTier::Low,
        cross_platform_strength: CrossPlatformStrength::None,
        first_seen: now,
        last_seen: now,
    }
}

fn fold_record(slot: &mut Slot, record: &PainPointRecord, description: &str, now: DateTime<Utc>) {
    slot.add_variant(description);
    let point = &mut slot.point;

    if point.category == Category::Other {
        point.category = record.category;
    }
    point.emotional_intensity = point.emotional_intensity.max(record.intensity()).clamp(1, 5);

    if record.payment_signal {
        point.payment_signal = true;
        if let Some(quote) = record.payment_quote.as_deref() {
            push_quote(&mut point.payment_quotes, quote);
        }
    }
    if let Some(workaround) = record.current_workaround.as_deref() {
        append_workaround(&mut point.current_workaround, workaround);
    }

    for source in &record.sources {
        push_source(&mut point.sources, source);
    }

    let key = record
        .dominant_platform()
        .map_or(UNATTRIBUTED_USERS, |p| p.as_str());
    let users = point.users_by_platform.entry(key.to_string()).or_insert(0);
    *users = (*users).max(record.users());

    point.merge_count += 1;
    point.last_seen = point.last_seen.max(now);
    refresh_derived(point);
}

fn push_quote(quotes: &mut Vec<String>, quote: &str) {
    let quote = quote.trim();
    if !quote.is_empty() && !quotes.iter().any(|q| q == quote) {
        quotes.push(quote.to_string());
    }
}

/// Append only when the new text adds something the existing text lacks.
fn append_workaround(current: &mut Option<String>, incoming: &str) {
    let incoming = incoming.trim();
    if incoming.is_empty() {
        return;
    }
    match current {
        None => *current = Some(incoming.to_string()),
        Some(existing) => {
            if !existing.to_lowercase().contains(&incoming.to_lowercase()) {
                existing.push_str("; ");
                existing.push_str(incoming);
            }
        }
    }
}

fn push_source(sources: &mut Vec<EvidenceSource>, source: &EvidenceSource) {
    let Some(url) = canonical_url(&source.url) else {
        warn!(
            "Dropping {} evidence without a URL: {:?}",
            source.platform, source.quote
        );
        return;
    };
    let duplicate = sources
        .iter()
        .any(|s| canonical_url(&s.url).as_deref() == Some(url.as_str()));
    if !duplicate {
        sources.push(EvidenceSource {
            url,
            platform: source.platform,
            quote: source.quote.trim().to_string(),
        });
    }
}

/// Recompute the fields that are pure functions of sources and user counts.
fn refresh_derived(point: &mut AggregatedPainPoint) {
    point.platforms = point.sources.iter().map(|s| s.platform).collect();

    let attributed: u32 = point
        .users_by_platform
        .iter()
        .filter(|(key, _)| key.as_str() != UNATTRIBUTED_USERS)
        .map(|(_, users)| *users)
        .sum();
    let unattributed = point
        .users_by_platform
        .get(UNATTRIBUTED_USERS)
        .copied()
        .unwrap_or(0);
    point.unique_users = attributed.max(unattributed).max(1);
}
