use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use painminer_core::{AppConfig, ErrorExt, Platform};
use pipeline::{ImportRequest, Pipeline, RunSummary, SearchRequest};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "pain_miner=info,pipeline=info,platform_clients=info,llm_interface=info,database=info,reporter=info,scoring_engine=info";
const VERBOSE_FILTER: &str = "pain_miner=debug,pipeline=debug,platform_clients=debug,llm_interface=debug,database=debug,reporter=debug,scoring_engine=debug";

#[derive(Parser)]
#[command(name = "pain-miner", version, about = "Discover user pain points from HN, Reddit, Product Hunt and X")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search platforms for pain points about a topic
    Search {
        /// Topic to search, e.g. "invoicing for freelancers"
        topic: String,
        /// Comma-separated platforms: hn,reddit,producthunt,x
        #[arg(long, value_delimiter = ',', default_value = "hn,producthunt")]
        platforms: Vec<String>,
        /// Comma-separated subreddits replacing the configured ones
        #[arg(long, value_delimiter = ',')]
        subreddits: Vec<String>,
        /// Skip LLM extraction
        #[arg(long)]
        no_analyze: bool,
    },
    /// Run extraction on stored posts that were not analyzed yet
    Analyze {
        #[arg(long)]
        topic: String,
    },
    /// Import posts from a JSON array, e.g. an exported search
    Import {
        file: PathBuf,
        #[arg(long)]
        topic: String,
        /// Platform the posts are attributed to
        #[arg(long, default_value = "x")]
        platform: String,
        #[arg(long)]
        no_analyze: bool,
    },
    /// Print the latest report
    Report {
        #[arg(long)]
        topic: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER })
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn parse_platforms(names: &[String]) -> Result<Vec<Platform>> {
    let mut platforms = Vec::new();
    for name in names.iter().filter(|n| !n.trim().is_empty()) {
        let platform: Platform = name.parse()?;
        if !platforms.contains(&platform) {
            platforms.push(platform);
        }
    }
    if platforms.is_empty() {
        bail!("no platforms selected");
    }
    Ok(platforms)
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("  {} posts collected, {} scored, {} analyzed", summary.fetched, summary.scored, summary.analyzed);
    if summary.found_nothing() {
        println!("  No pain points found");
    } else {
        println!("  {} pain points for '{}'", summary.pain_points.len(), summary.run.topic);
    }
    if let Some(path) = &summary.report_path {
        println!("  Report: {}", path.display());
    }
    if let Some(elapsed) = summary.run.elapsed() {
        println!("  Took {:.1}s", elapsed.num_milliseconds() as f64 / 1000.0);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let pipeline = Pipeline::from_config(config)
        .await
        .context("starting pipeline")?;

    match cli.command {
        Command::Search {
            topic,
            platforms,
            subreddits,
            no_analyze,
        } => {
            let request = SearchRequest {
                topic,
                platforms: parse_platforms(&platforms)?,
                subreddits,
                analyze: !no_analyze,
            };
            print_summary(&pipeline.search(&request).await?);
        }
        Command::Analyze { topic } => {
            let summary = pipeline.analyze(&topic).await?;
            if summary.report_path.is_none() {
                println!("No unanalyzed posts found for '{topic}'. Run a search first.");
            } else {
                print_summary(&summary);
            }
        }
        Command::Import {
            file,
            topic,
            platform,
            no_analyze,
        } => {
            let request = ImportRequest {
                path: file,
                topic,
                platform: platform.parse()?,
                analyze: !no_analyze,
            };
            print_summary(&pipeline.import(&request).await?);
        }
        Command::Report { topic } => match pipeline.latest_report(topic.as_deref()).await? {
            Some(report) => println!("{report}"),
            None => println!("No runs found. Run a search first."),
        },
    }

    pipeline.database().close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    tracing::info!("Starting pain-miner");
    if let Err(e) = run(cli).await {
        if let Some(core) = e.downcast_ref::<painminer_core::CoreError>() {
            core.log_error();
            eprintln!("{}", core.user_friendly_message());
        }
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_platforms_dedups_and_accepts_aliases() {
        let names = vec!["hn".to_string(), "twitter".to_string(), "x".to_string(), " ".to_string()];
        assert_eq!(parse_platforms(&names).unwrap(), vec![Platform::Hn, Platform::X]);
        assert!(parse_platforms(&["myspace".to_string()]).is_err());
        assert!(parse_platforms(&[]).is_err());
    }

    #[test]
    fn test_cli_parses_search() {
        let cli = Cli::try_parse_from([
            "pain-miner",
            "search",
            "invoicing",
            "--platforms",
            "hn,reddit",
            "--subreddits",
            "freelance,smallbusiness",
            "--no-analyze",
        ])
        .unwrap();
        match cli.command {
            Command::Search {
                topic,
                platforms,
                subreddits,
                no_analyze,
            } => {
                assert_eq!(topic, "invoicing");
                assert_eq!(platforms, vec!["hn", "reddit"]);
                assert_eq!(subreddits, vec!["freelance", "smallbusiness"]);
                assert!(no_analyze);
            }
            _ => panic!("expected search"),
        }
    }
}
