//! Markdown rendering of a run's posts and aggregated pain points.

use chrono::{DateTime, Utc};
use painminer_core::{
    AggregatedPainPoint, ConfidenceTier, CoreError, OutputConfig, Platform, ScoredPost,
};
use std::path::{Path, PathBuf};
use tracing::info;

const TOP_POSTS: usize = 20;
const HUB_POSTS: usize = 10;
const HUB_MIN_COMMENTS: i64 = 10;
const MAX_QUOTES: usize = 3;
const MAX_SOURCES: usize = 5;

/// Everything a report is rendered from.
#[derive(Debug, Clone)]
pub struct ReportInput<'a> {
    pub topic: &'a str,
    /// Posts of the topic, best first.
    pub posts: &'a [ScoredPost],
    /// Posts sent to extraction in this run.
    pub analyzed: usize,
    pub pain_points: &'a [AggregatedPainPoint],
    /// Posts below this relevance are left out of the discussion hubs.
    pub relevance_floor: f64,
    pub generated_at: DateTime<Utc>,
}

/// File-name friendly form of a topic: lowercase words joined by dashes, at most 40 chars.
pub fn slugify(topic: &str) -> String {
    let mut slug = String::new();
    for word in topic
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(&word.to_lowercase());
    }
    let slug: String = slug.chars().take(40).collect();
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "report".to_string()
    } else {
        slug.to_string()
    }
}

fn clip(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn tier_heading(tier: ConfidenceTier) -> &'static str {
    match tier {
        ConfidenceTier::High => "High Confidence Pain Points",
        ConfidenceTier::Medium => "Medium Confidence",
        ConfidenceTier::Low => "Low Confidence / Emerging Signals",
    }
}

#[derive(Debug, Clone)]
pub struct Reporter {
    output_dir: PathBuf,
}

impl Reporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(config.dir.clone())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `<output>/<date>-<slug>.md`
    pub fn report_path(&self, topic: &str, generated_at: DateTime<Utc>) -> PathBuf {
        self.output_dir.join(format!(
            "{}-{}.md",
            generated_at.format("%Y-%m-%d"),
            slugify(topic)
        ))
    }

    pub fn render(&self, input: &ReportInput<'_>) -> String {
        let mut lines = Vec::new();
        lines.push(format!("# Pain Point Research: {}", input.topic));
        lines.push(format!(
            "> Generated: {} | Tool: pain-miner",
            input.generated_at.format("%Y-%m-%d %H:%M")
        ));
        lines.push(String::new());

        transparency(&mut lines, input);

        if input.pain_points.is_empty() {
            top_posts(&mut lines, input.posts);
        } else {
            for tier in [ConfidenceTier::High, ConfidenceTier::Medium, ConfidenceTier::Low] {
                let mut points: Vec<&AggregatedPainPoint> = input
                    .pain_points
                    .iter()
                    .filter(|p| p.confidence_tier == tier)
                    .collect();
                if points.is_empty() {
                    continue;
                }
                points.sort_by(|a, b| {
                    b.merge_count
                        .cmp(&a.merge_count)
                        .then_with(|| b.unique_users.cmp(&a.unique_users))
                        .then_with(|| b.emotional_intensity.cmp(&a.emotional_intensity))
                        .then_with(|| a.description.cmp(&b.description))
                });
                lines.push(format!("## {}", tier_heading(tier)));
                lines.push(String::new());
                for (i, point) in points.iter().enumerate() {
                    pain_point(&mut lines, i + 1, point);
                }
            }
        }

        hubs(&mut lines, input);

        let mut content = lines.join("\n");
        content.push('\n');
        content
    }

    /// Render and write the report, creating the output directory if needed.
    pub async fn write(&self, input: &ReportInput<'_>) -> Result<PathBuf, CoreError> {
        let path = self.report_path(input.topic, input.generated_at);
        tokio::fs::create_dir_all(&self.output_dir).await?;
        tokio::fs::write(&path, self.render(input)).await?;
        info!("Report written to {}", path.display());
        Ok(path)
    }
}

fn transparency(lines: &mut Vec<String>, input: &ReportInput<'_>) {
    lines.push("## Search Transparency".to_string());
    lines.push(String::new());
    lines.push("| Metric | Value |".to_string());
    lines.push("|--------|-------|".to_string());
    lines.push(format!("| Total posts collected | {} |", input.posts.len()));
    for platform in Platform::ALL {
        let count = input
            .posts
            .iter()
            .filter(|p| p.post.platform == platform)
            .count();
        // HN and Reddit are always listed, the optional sources only when they contributed.
        if count > 0 || matches!(platform, Platform::Hn | Platform::Reddit) {
            lines.push(format!("| {} posts | {} |", platform.display_name(), count));
        }
    }
    lines.push(format!("| Posts sent to extraction | {} |", input.analyzed));
    lines.push(format!("| Pain points identified | {} |", input.pain_points.len()));
    let cross = input
        .pain_points
        .iter()
        .filter(|p| p.is_cross_platform())
        .count();
    lines.push(format!("| Cross-platform pain points | {cross} |"));
    lines.push(String::new());
}

fn top_posts(lines: &mut Vec<String>, posts: &[ScoredPost]) {
    lines.push("## Results".to_string());
    lines.push(String::new());
    lines.push("No pain points found.".to_string());
    lines.push(String::new());
    if posts.is_empty() {
        return;
    }
    lines.push("### Top Scored Posts (Rule-Based)".to_string());
    lines.push(String::new());
    for (i, scored) in posts.iter().take(TOP_POSTS).enumerate() {
        let post = &scored.post;
        let title = if post.title.trim().is_empty() {
            "Untitled".to_string()
        } else {
            clip(post.title.trim(), 80)
        };
        lines.push(format!("**{}. [{}]({})**", i + 1, title, post.url));
        lines.push(format!(
            "- Platform: {} | Points: {} | Pain: {:.2} | Demand: {:.2} | Score: {:.2}",
            post.platform.display_name(),
            post.points,
            scored.pain_score,
            scored.demand_score,
            scored.composite_score
        ));
        let preview = clip(&post.body, 200).replace('\n', " ");
        if !preview.trim().is_empty() {
            lines.push(format!("- > {}...", preview.trim()));
        }
        lines.push(String::new());
    }
}

fn pain_point(lines: &mut Vec<String>, index: usize, point: &AggregatedPainPoint) {
    lines.push(format!("### {}. {}", index, point.description));
    lines.push(String::new());
    lines.push(format!("- **Category**: {}", point.category));
    lines.push(format!(
        "- **Emotional intensity**: {}/5",
        point.emotional_intensity
    ));
    lines.push(format!("- **Unique users**: {}", point.unique_users));
    lines.push(format!("- **Mentions merged**: {}", point.merge_count));
    lines.push(format!(
        "- **Payment signal**: {}",
        if point.payment_signal { "Yes" } else { "No" }
    ));
    for quote in point.payment_quotes.iter().take(MAX_QUOTES) {
        lines.push(format!("  - > \"{quote}\""));
    }
    if let Some(workaround) = &point.current_workaround {
        lines.push(format!("- **Current workaround**: {workaround}"));
    }

    let platforms: Vec<&str> = point.platforms.iter().map(|p| p.display_name()).collect();
    if !platforms.is_empty() {
        lines.push(format!(
            "- **Platforms**: {} (cross-platform: {})",
            platforms.join(", "),
            point.cross_platform_strength
        ));
    }

    let quotes: Vec<&str> = point
        .sources
        .iter()
        .map(|s| s.quote.trim())
        .filter(|q| !q.is_empty())
        .take(MAX_QUOTES)
        .collect();
    if !quotes.is_empty() {
        lines.push("- **Quotes**:".to_string());
        for quote in quotes {
            lines.push(format!("  - > \"{quote}\""));
        }
    }

    if !point.sources.is_empty() {
        let links: Vec<String> = point
            .sources
            .iter()
            .take(MAX_SOURCES)
            .map(|s| format!("[{}]({})", s.platform, s.url))
            .collect();
        lines.push(format!("- **Sources**: {}", links.join(", ")));
    }
    lines.push(String::new());
}

fn hubs(lines: &mut Vec<String>, input: &ReportInput<'_>) {
    let mut hubs: Vec<&ScoredPost> = input
        .posts
        .iter()
        .filter(|p| {
            p.post.num_comments > HUB_MIN_COMMENTS && p.relevance_score >= input.relevance_floor
        })
        .collect();
    if hubs.is_empty() {
        return;
    }
    hubs.sort_by(|a, b| {
        b.post
            .points
            .cmp(&a.post.points)
            .then_with(|| b.post.num_comments.cmp(&a.post.num_comments))
    });

    lines.push("## High-Engagement Discussion Hubs".to_string());
    lines.push(String::new());
    lines.push("These posts have the most discussion and are worth reading manually:".to_string());
    lines.push(String::new());
    for scored in hubs.into_iter().take(HUB_POSTS) {
        let post = &scored.post;
        lines.push(format!(
            "- [{}]({}) ({} points, {} comments, {})",
            clip(post.title.trim(), 80),
            post.url,
            post.points,
            post.num_comments,
            post.platform.display_name()
        ));
    }
    lines.push(String::new());
}
