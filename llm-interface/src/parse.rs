//! Turning model output into [`PainPointRecord`]s.
//!
//! Models wrap JSON in Markdown fences, return numbers as strings and
//! occasionally emit half an object. Every item is parsed on its own so one
//! bad item never costs the rest of the batch.

use painminer_core::{canonical_url, Category, EvidenceSource, PainPointRecord, Platform};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

const MAX_QUOTES: usize = 3;

/// Remove a surrounding ```json fence, if any.
pub fn strip_code_fences(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => rest.trim_start_matches("json"),
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Which platform each post URL in a batch came from.
#[derive(Debug, Default, Clone)]
pub struct UrlIndex {
    by_url: HashMap<String, Platform>,
}

impl UrlIndex {
    pub fn new<'a>(urls: impl IntoIterator<Item = (&'a str, Platform)>) -> Self {
        let by_url = urls
            .into_iter()
            .filter_map(|(url, platform)| canonical_url(url).map(|u| (u, platform)))
            .collect();
        Self { by_url }
    }

    /// The platform of a cited URL: the post it came from, else its host.
    pub fn platform_of(&self, url: &str) -> Option<Platform> {
        canonical_url(url)
            .and_then(|u| self.by_url.get(&u).copied())
            .or_else(|| Platform::from_url(url))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuoteItem {
    Text(String),
    Cited {
        #[serde(default, alias = "text")]
        quote: String,
        #[serde(default, alias = "source_url")]
        url: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct ExtractedItem {
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    emotional_intensity: Option<Value>,
    #[serde(default)]
    payment_signal: Option<Value>,
    #[serde(default)]
    payment_quote: Option<String>,
    #[serde(default)]
    current_workaround: Option<String>,
    #[serde(default)]
    unique_users: Option<Value>,
    #[serde(default)]
    representative_quotes: Vec<QuoteItem>,
    #[serde(default)]
    source_urls: Vec<String>,
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes"),
        _ => false,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != "null")
}

fn parse_category(raw: Option<&str>) -> Category {
    raw.map(|c| c.trim().to_ascii_lowercase().replace([' ', '-'], "_"))
        .and_then(|c| serde_json::from_value(Value::String(c)).ok())
        .unwrap_or_default()
}

impl ExtractedItem {
    fn into_record(self, urls: &UrlIndex) -> Option<PainPointRecord> {
        let description = self.description.trim().to_string();
        if description.is_empty() {
            return None;
        }

        let mut record = PainPointRecord::new(description);
        record.category = parse_category(self.category.as_deref());
        record.emotional_intensity = self
            .emotional_intensity
            .as_ref()
            .and_then(as_number)
            .map_or(1, |n| n.round().clamp(1.0, 5.0) as u8);
        record.payment_signal = self.payment_signal.as_ref().is_some_and(as_bool);
        record.payment_quote = non_blank(self.payment_quote);
        record.current_workaround = non_blank(self.current_workaround);
        record.unique_users = self
            .unique_users
            .as_ref()
            .and_then(as_number)
            .map_or(1, |n| n.round().max(1.0) as u32);

        for url in self.source_urls {
            push_source(&mut record.sources, urls, url.trim(), None);
        }

        let mut quotes = 0;
        for item in self.representative_quotes {
            if quotes == MAX_QUOTES {
                break;
            }
            let (quote, url) = match item {
                QuoteItem::Text(quote) => (quote, None),
                QuoteItem::Cited { quote, url } => (quote, url),
            };
            let quote = quote.trim().to_string();
            if quote.is_empty() {
                continue;
            }
            quotes += 1;
            match url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
                Some(url) => push_source(&mut record.sources, urls, url, Some(quote)),
                None => {
                    if let Some(source) = record.sources.iter_mut().find(|s| s.quote.is_empty()) {
                        source.quote = quote;
                    }
                }
            }
        }
        Some(record)
    }
}

/// Add a cited source, or attach `quote` to the one already cited.
fn push_source(sources: &mut Vec<EvidenceSource>, urls: &UrlIndex, url: &str, quote: Option<String>) {
    let Some(key) = canonical_url(url) else {
        return;
    };
    if let Some(existing) = sources
        .iter_mut()
        .find(|s| canonical_url(&s.url).as_deref() == Some(key.as_str()))
    {
        if let Some(quote) = quote {
            if existing.quote.is_empty() {
                existing.quote = quote;
            }
        }
        return;
    }
    match urls.platform_of(url) {
        Some(platform) => sources.push(EvidenceSource {
            url: url.to_string(),
            platform,
            quote: quote.unwrap_or_default(),
        }),
        None => debug!("Dropping source with unknown platform: {}", url),
    }
}

/// Parse a model response into records, skipping items that do not fit.
///
/// Returns an error only when the response is not a JSON array at all.
pub fn parse_records(response: &str, urls: &UrlIndex) -> Result<Vec<PainPointRecord>, serde_json::Error> {
    let value: Value = serde_json::from_str(strip_code_fences(response))?;
    let items = match value {
        Value::Array(items) => items,
        // Some models wrap the array in an object.
        Value::Object(mut map) => match map
            .remove("pain_points")
            .or_else(|| map.into_iter().find_map(|(_, v)| v.is_array().then_some(v)))
        {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<ExtractedItem>(item) {
            Ok(item) => match item.into_record(urls) {
                Some(record) => records.push(record),
                None => warn!("Skipping extracted item {}: empty description", index),
            },
            Err(e) => warn!("Skipping malformed extracted item {}: {}", index, e),
        }
    }
    Ok(records)
}
