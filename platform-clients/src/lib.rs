pub mod adapter;
pub mod hn;
pub mod http;
pub mod import;
pub mod producthunt;
pub mod rate_limiter;
pub mod reddit;
pub mod retry;
pub mod x;

pub use adapter::{render_queries, FetchBatch, PostCollector, SourceAdapter};
pub use hn::HnAdapter;
pub use http::{FetcherConfig, HttpFetcher};
pub use import::{parse_import, ImportSource};
pub use producthunt::ProductHuntAdapter;
pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use reddit::RedditAdapter;
pub use retry::{RetryConfig, RetryExecutor};
pub use x::XAdapter;

use painminer_core::{AppConfig, CoreError, Platform};
use std::time::Duration;
use tracing::info;

/// Adapter options that come from the command line rather than the config file.
#[derive(Debug, Clone, Default)]
pub struct SearchOverrides {
    pub subreddits: Vec<String>,
}

fn fetcher_config(config: &AppConfig, platform: Platform) -> FetcherConfig {
    FetcherConfig::new(
        platform,
        Duration::from_secs(config.search.request_timeout_secs),
        Duration::from_millis(config.search.query_delay_ms),
    )
}

/// Build one adapter per requested platform, skipping those disabled in config.
pub fn build_adapters(
    config: &AppConfig,
    platforms: &[Platform],
    overrides: &SearchOverrides,
) -> Result<Vec<Box<dyn SourceAdapter>>, CoreError> {
    let mut adapters: Vec<Box<dyn SourceAdapter>> = Vec::new();
    for &platform in platforms {
        if !config.platforms.is_enabled(platform) {
            info!("{} is disabled in the configuration, skipping", platform.display_name());
            continue;
        }
        let fetcher = fetcher_config(config, platform);
        let adapter: Box<dyn SourceAdapter> = match platform {
            Platform::Hn => Box::new(HnAdapter::new(config.platforms.hn.clone(), fetcher)?),
            Platform::Reddit => Box::new(
                RedditAdapter::new(config.platforms.reddit.clone(), fetcher)?
                    .with_subreddits(overrides.subreddits.clone()),
            ),
            Platform::ProductHunt => Box::new(
                ProductHuntAdapter::new(config.platforms.producthunt.clone(), fetcher)?
                    .with_posted_within_days(config.dedup.max_post_age_days),
            ),
            Platform::X => Box::new(XAdapter::new(config.platforms.x.clone(), fetcher)?),
        };
        adapters.push(adapter);
    }
    Ok(adapters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_adapters_skips_disabled() {
        let mut config = AppConfig::default();
        config.platforms.x.enabled = false;
        let adapters = build_adapters(
            &config,
            &[Platform::Hn, Platform::X, Platform::Reddit],
            &SearchOverrides::default(),
        )
        .unwrap();
        let platforms: Vec<Platform> = adapters.iter().map(|a| a.platform()).collect();
        assert_eq!(platforms, vec![Platform::Hn, Platform::Reddit]);
    }
}
