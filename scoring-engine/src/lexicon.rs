//! Weighted vocabularies the scorer matches post text against.
//!
//! A [`Lexicon`] is plain data built once and handed to the scorer; nothing
//! here is global or mutable after construction.

use painminer_core::LexiconConfig;

/// Stems matched at the start of a word, so "frustrat" hits "frustrating".
const PAIN_WORDS: &[(&str, f64)] = &[
    ("frustrat", 1.0),
    ("hate", 1.0),
    ("wish", 0.5),
    ("terrible", 1.0),
    ("awful", 1.0),
    ("slow", 0.5),
    ("expensive", 1.0),
    ("inconsisten", 0.75),
    ("artifact", 0.5),
    ("broken", 1.0),
    ("waste", 0.75),
    ("painful", 1.0),
    ("annoying", 1.0),
    ("disappoint", 1.0),
    ("useless", 1.0),
    ("garbage", 1.0),
    ("horrible", 1.0),
    ("unusable", 1.25),
    ("buggy", 1.0),
    ("overpriced", 1.25),
    ("scam", 1.0),
    ("misleading", 0.75),
    ("workaround", 1.0),
    ("hack", 0.5),
    ("tedious", 1.0),
    ("clunky", 1.0),
    ("unreliable", 1.0),
    ("laggy", 0.75),
    ("crash", 0.75),
    ("glitch", 0.75),
];

/// Multi-word phrases matched anywhere in the text.
const DEMAND_PHRASES: &[(&str, f64)] = &[
    ("pay for", 1.0),
    ("would pay", 1.5),
    ("need a tool", 1.25),
    ("wish there was", 1.25),
    ("someone should build", 1.5),
    ("is there a", 0.5),
    ("looking for", 0.5),
    ("alternative to", 1.0),
    ("shut up and take my money", 2.0),
    ("i'd pay", 1.5),
    ("take my money", 1.5),
    ("does anyone know", 0.5),
    ("am i the only one", 0.75),
];

const EXTRA_TERM_WEIGHT: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedTerm {
    pub term: String,
    pub weight: f64,
}

impl WeightedTerm {
    fn new(term: &str, weight: f64) -> Self {
        Self {
            term: term.to_lowercase(),
            weight,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Lexicon {
    pain_words: Vec<WeightedTerm>,
    demand_phrases: Vec<WeightedTerm>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Lexicon {
    pub fn builtin() -> Self {
        Self {
            pain_words: PAIN_WORDS
                .iter()
                .map(|(t, w)| WeightedTerm::new(t, *w))
                .collect(),
            demand_phrases: DEMAND_PHRASES
                .iter()
                .map(|(t, w)| WeightedTerm::new(t, *w))
                .collect(),
        }
    }

    /// Built-in vocabularies plus whatever the configuration adds.
    pub fn from_config(config: &LexiconConfig) -> Self {
        let mut lexicon = Self::builtin();
        for word in &config.extra_pain_words {
            push_unique(&mut lexicon.pain_words, word);
        }
        for phrase in &config.extra_demand_phrases {
            push_unique(&mut lexicon.demand_phrases, phrase);
        }
        lexicon
    }

    pub fn pain_words(&self) -> &[WeightedTerm] {
        &self.pain_words
    }

    pub fn demand_phrases(&self) -> &[WeightedTerm] {
        &self.demand_phrases
    }

    /// Weighted count of pain-stem occurrences in already-lowercased text.
    pub fn pain_hits(&self, text: &str) -> f64 {
        self.pain_words
            .iter()
            .map(|t| t.weight * count_word_prefix(text, &t.term) as f64)
            .sum()
    }

    /// Weighted count of demand-phrase occurrences in already-lowercased text.
    pub fn demand_hits(&self, text: &str) -> f64 {
        self.demand_phrases
            .iter()
            .map(|t| t.weight * text.matches(t.term.as_str()).count() as f64)
            .sum()
    }
}

fn push_unique(terms: &mut Vec<WeightedTerm>, raw: &str) {
    let term = raw.trim().to_lowercase();
    if term.is_empty() || terms.iter().any(|t| t.term == term) {
        return;
    }
    terms.push(WeightedTerm {
        term,
        weight: EXTRA_TERM_WEIGHT,
    });
}

/// Occurrences of `stem` that begin a word.
fn count_word_prefix(text: &str, stem: &str) -> usize {
    if stem.is_empty() {
        return 0;
    }
    text.match_indices(stem)
        .filter(|(start, _)| {
            text[..*start]
                .chars()
                .next_back()
                .map_or(true, |c| !c.is_alphanumeric())
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stems_match_word_starts_only() {
        assert_eq!(count_word_prefix("so frustrating, frustrated", "frustrat"), 2);
        // "hate" inside "whatever" is not a complaint
        assert_eq!(count_word_prefix("whatever works", "hate"), 0);
        assert_eq!(count_word_prefix("", "hate"), 0);
    }

    #[test]
    fn test_pain_hits_are_weighted() {
        let lexicon = Lexicon::builtin();
        let hits = lexicon.pain_hits("this is unusable and slow");
        assert!((hits - 1.75).abs() < 1e-9);
    }

    #[test]
    fn test_demand_phrases_match_as_substrings() {
        let lexicon = Lexicon::builtin();
        assert!(lexicon.demand_hits("honestly i would pay for this") >= 2.5);
        assert_eq!(lexicon.demand_hits("nothing to see here"), 0.0);
    }

    #[test]
    fn test_config_extras_are_appended_once() {
        let config = LexiconConfig {
            extra_pain_words: vec!["Flaky".to_string(), "hate".to_string(), " ".to_string()],
            extra_demand_phrases: vec!["Shut up and take my money".to_string()],
        };
        let lexicon = Lexicon::from_config(&config);
        assert_eq!(lexicon.pain_words().len(), PAIN_WORDS.len() + 1);
        assert_eq!(lexicon.demand_phrases().len(), DEMAND_PHRASES.len());
        assert!(lexicon.pain_hits("flaky tests") > 0.0);
    }
}
