//! Tokenization shared by relevance scoring and pain-point similarity.

use std::collections::HashSet;

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "for", "of", "to", "in", "on", "with", "is", "are", "was",
    "were", "be", "been", "being", "that", "this", "it", "its", "my", "your", "our", "their",
    "what", "how", "why", "i", "we", "they", "you", "at", "by", "as", "from", "so", "but", "can",
    "do", "does", "has", "have", "just", "very",
];

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Collapse a simple plural so "teams" and "team" compare equal.
fn normalize(word: &str) -> String {
    if word.len() > 3
        && word.ends_with('s')
        && !word.ends_with("ss")
        && !word.ends_with("us")
        && !word.ends_with("is")
    {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

/// Ordered content words: lowercase alphanumeric runs of two or more
/// characters with stop words removed.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 2 && !is_stop_word(w))
        .map(normalize)
        .collect()
}

pub fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// |A ∩ B| / |A ∪ B|, defined as 0 when both sets are empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// A topic reduced to the terms and adjacent pairs relevance is measured against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicTerms {
    terms: Vec<String>,
    phrases: Vec<(String, String)>,
}

impl TopicTerms {
    pub fn from_topic(topic: &str) -> Self {
        Self::from_terms(tokenize(topic))
    }

    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique: Vec<String> = Vec::new();
        for term in terms {
            for token in tokenize(term.as_ref()) {
                if !unique.contains(&token) {
                    unique.push(token);
                }
            }
        }
        let phrases = unique
            .windows(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();
        Self {
            terms: unique,
            phrases,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Share of topic terms present in `tokens`, boosted when adjacent topic
    /// terms also appear next to each other. An empty topic matches everything.
    pub fn relevance(&self, tokens: &[String]) -> f64 {
        if self.terms.is_empty() {
            return 1.0;
        }
        let present: HashSet<&str> = tokens.iter().map(String::as_str).collect();
        let hits = self
            .terms
            .iter()
            .filter(|t| present.contains(t.as_str()))
            .count();
        let fraction = hits as f64 / self.terms.len() as f64;

        let phrase_hits = self
            .phrases
            .iter()
            .filter(|(first, second)| {
                tokens
                    .windows(2)
                    .any(|w| &w[0] == first && &w[1] == second)
            })
            .count();
        if phrase_hits == 0 {
            return fraction;
        }
        fraction.max((0.6 + 0.2 * phrase_hits as f64).min(1.0))
    }
}
