use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;
use sea_orm::DatabaseConnection;
use serde_json::Value;

use crate::config::{CacheConfig, ChainConfig, RateLimitingConfig};
use crate::tips::RatePolicy;

#[derive(Clone)]
pub struct AppState {
    pub database: DatabaseConnection,
    pub cache: Arc<ApiCache>,
    pub chain: Arc<ChainConfig>,
    pub rate_limiting: RateLimitingConfig,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        database: DatabaseConnection,
        cache: Arc<ApiCache>,
        chain: ChainConfig,
        rate_limiting: RateLimitingConfig,
    ) -> Self {
        assert!(
            cache.summary_capacity >= 10,
            "Summary cache capacity must be configured"
        );
        Self {
            database,
            cache,
            chain: Arc::new(chain),
            rate_limiting,
            start_time: Instant::now(),
        }
    }

    /// Window parameters for the live submission gate and allowance display.
    pub fn policy(&self) -> RatePolicy {
        RatePolicy::new(
            self.rate_limiting.max_claims,
            self.rate_limiting.window_hours,
        )
    }
}

pub struct ApiCache {
    pub summaries: Cache<String, Value>,
    pub leaderboards: Cache<String, Value>,
    pub summary_capacity: u64,
}

impl ApiCache {
    pub fn new(config: &CacheConfig) -> Self {
        assert!(
            config.summaries_max_capacity >= 10,
            "Summary cache capacity threshold"
        );
        assert!(
            config.leaderboards_max_capacity >= 10,
            "Leaderboard cache capacity threshold"
        );

        let summaries = Cache::builder()
            .max_capacity(config.summaries_max_capacity)
            .time_to_live(Duration::from_secs(config.summaries_ttl_seconds))
            .time_to_idle(Duration::from_secs(config.summaries_ttl_seconds / 2 + 1))
            .build();

        let leaderboards = Cache::builder()
            .max_capacity(config.leaderboards_max_capacity)
            .time_to_live(Duration::from_secs(config.leaderboards_ttl_seconds))
            .time_to_idle(Duration::from_secs(config.leaderboards_ttl_seconds / 2 + 1))
            .build();

        Self {
            summaries,
            leaderboards,
            summary_capacity: config.summaries_max_capacity,
        }
    }
}
