use painminer_core::ScoredPost;
use serde::Serialize;

pub const ANALYSIS_PROMPT: &str = r#"Analyze these community posts about "{topic}" and extract user pain points.

For each distinct pain point (merge similar ones):
1. description: one-sentence summary
2. category: one of [missing_feature, pricing, workflow_friction, integration_need, quality_issue, learning_curve]
3. emotional_intensity: 1-5 (5 = extreme frustration)
4. payment_signal: true/false
5. payment_quote: exact quote if payment_signal is true, else null
6. current_workaround: how users solve it now (null if unknown)
7. unique_users: count of distinct users mentioning this
8. representative_quotes: array of max 3 objects {"quote": ..., "url": ...}
9. source_urls: array of all source URLs

Rules:
- One person complaining repeatedly is not a pattern. Count UNIQUE users only.
- "I wish X existed" is stronger signal than "X is annoying"
- Workarounds involving 3+ tools or manual steps = high-value pain point
- Merge posts describing the same core frustration into one pain point
- Ignore meta-complaints about platforms themselves unless directly relevant

Output ONLY a JSON array of pain point objects. No other text.

Posts data:
{posts_json}"#;

/// The slice of a post the model sees.
#[derive(Debug, Serialize)]
pub struct PromptPost<'a> {
    pub url: &'a str,
    pub title: &'a str,
    pub body: String,
    pub author: &'a str,
    pub points: i64,
    pub platform: &'static str,
    pub community: &'a str,
    pub pain_score: f64,
    pub demand_score: f64,
}

impl<'a> PromptPost<'a> {
    pub fn new(scored: &'a ScoredPost, max_body_chars: usize) -> Self {
        let post = &scored.post;
        Self {
            url: &post.url,
            title: &post.title,
            body: truncate_chars(&post.body, max_body_chars),
            author: &post.author,
            points: post.points,
            platform: post.platform.as_str(),
            community: &post.community,
            pain_score: round2(scored.pain_score),
            demand_score: round2(scored.demand_score),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

pub fn build_prompt(topic: &str, posts: &[ScoredPost], max_body_chars: usize) -> Result<String, serde_json::Error> {
    let payload: Vec<PromptPost<'_>> = posts
        .iter()
        .map(|p| PromptPost::new(p, max_body_chars))
        .collect();
    let posts_json = serde_json::to_string_pretty(&payload)?;
    Ok(ANALYSIS_PROMPT
        .replace("{topic}", topic)
        .replace("{posts_json}", &posts_json))
}
