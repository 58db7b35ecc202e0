use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_admin_listen")]
    pub admin_listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            admin_listen: default_admin_listen(),
        }
    }
}

/// Quotas imposed by the upstream market-data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Minimum spacing between two accepted fetches of the same key.
    #[serde(default = "default_per_key_interval")]
    pub per_key_interval_secs: f64,
    #[serde(default = "default_global_limit_per_minute")]
    pub global_limit_per_minute: usize,
    #[serde(default = "default_per_second_limit")]
    pub per_second_limit: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_key_interval_secs: default_per_key_interval(),
            global_limit_per_minute: default_global_limit_per_minute(),
            per_second_limit: default_per_second_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
    /// Soft ceiling: new writes are refused once the tracked size exceeds it.
    #[serde(default = "default_cache_max_memory_mb")]
    pub max_memory_mb: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl(),
            max_entries: default_cache_max_entries(),
            max_memory_mb: default_cache_max_memory_mb(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_stats_retention_hours")]
    pub stats_retention_hours: u64,
    #[serde(default = "default_cache_hit_rate_target")]
    pub cache_hit_rate_target_percent: f64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            stats_retention_hours: default_stats_retention_hours(),
            cache_hit_rate_target_percent: default_cache_hit_rate_target(),
        }
    }
}

// Default value helpers
fn default_admin_listen() -> String {
    "127.0.0.1:9090".to_string()
}
fn default_true() -> bool {
    true
}
fn default_per_key_interval() -> f64 {
    30.0
}
fn default_global_limit_per_minute() -> usize {
    20
}
fn default_per_second_limit() -> usize {
    2
}
fn default_cache_ttl() -> u64 {
    30
}
fn default_cache_max_entries() -> usize {
    1000
}
fn default_cache_max_memory_mb() -> f64 {
    200.0
}
fn default_stats_retention_hours() -> u64 {
    24
}
fn default_cache_hit_rate_target() -> f64 {
    80.0
}

impl AppConfig {
    /// Load configuration from a YAML file, then apply environment overrides.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yaml::from_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `MARKET_MCP_*` environment variables on top of the current values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Values that fail to parse are logged and the existing setting is kept.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        override_from(&lookup, "MARKET_MCP_RATE_LIMIT_INTERVAL", &mut self.rate_limit.per_key_interval_secs);
        override_from(&lookup, "MARKET_MCP_RATE_LIMIT_GLOBAL_PER_MINUTE", &mut self.rate_limit.global_limit_per_minute);
        override_from(&lookup, "MARKET_MCP_RATE_LIMIT_PER_SECOND", &mut self.rate_limit.per_second_limit);
        override_from(&lookup, "MARKET_MCP_CACHE_TTL", &mut self.cache.ttl_secs);
        override_from(&lookup, "MARKET_MCP_CACHE_MAX_SIZE", &mut self.cache.max_entries);
        override_from(&lookup, "MARKET_MCP_CACHE_MAX_MEMORY_MB", &mut self.cache.max_memory_mb);
        override_from(&lookup, "MARKET_MCP_MONITORING_STATS_RETENTION_HOURS", &mut self.monitoring.stats_retention_hours);
        override_from(&lookup, "MARKET_MCP_MONITORING_CACHE_HIT_RATE_TARGET", &mut self.monitoring.cache_hit_rate_target_percent);

        if let Some(raw) = lookup("MARKET_MCP_RATE_LIMITING_ENABLED") {
            self.rate_limit.enabled = raw.trim().eq_ignore_ascii_case("true");
        }
        if let Some(raw) = lookup("MARKET_MCP_CACHING_ENABLED") {
            self.cache.enabled = raw.trim().eq_ignore_ascii_case("true");
        }
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> anyhow::Result<()> {
        let rl = &self.rate_limit;
        if !rl.per_key_interval_secs.is_finite() || rl.per_key_interval_secs < 0.0 {
            anyhow::bail!(
                "rate_limit.per_key_interval_secs must be a non-negative number (got {})",
                rl.per_key_interval_secs
            );
        }
        if rl.global_limit_per_minute == 0 {
            anyhow::bail!("rate_limit.global_limit_per_minute must be at least 1");
        }
        if rl.per_second_limit == 0 {
            anyhow::bail!("rate_limit.per_second_limit must be at least 1");
        }

        if self.cache.ttl_secs == 0 {
            anyhow::bail!("cache.ttl_secs must be at least 1");
        }
        if self.cache.max_entries == 0 {
            anyhow::bail!("cache.max_entries must be at least 1");
        }
        if !self.cache.max_memory_mb.is_finite() || self.cache.max_memory_mb <= 0.0 {
            anyhow::bail!(
                "cache.max_memory_mb must be positive (got {})",
                self.cache.max_memory_mb
            );
        }

        if self.monitoring.stats_retention_hours == 0 {
            anyhow::bail!("monitoring.stats_retention_hours must be at least 1");
        }
        let target = self.monitoring.cache_hit_rate_target_percent;
        if !(0.0..=100.0).contains(&target) {
            anyhow::bail!(
                "monitoring.cache_hit_rate_target_percent must be within 0..=100 (got {})",
                target
            );
        }

        Ok(())
    }
}

fn override_from<F, T>(lookup: &F, name: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(name) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(variable = name, value = %raw, "ignoring unparseable override"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_upstream_quotas() {
        let config = AppConfig::default();
        assert_eq!(config.rate_limit.per_key_interval_secs, 30.0);
        assert_eq!(config.rate_limit.global_limit_per_minute, 20);
        assert_eq!(config.rate_limit.per_second_limit, 2);
        assert_eq!(config.cache.ttl_secs, 30);
        assert_eq!(config.cache.max_entries, 1000);
        assert_eq!(config.cache.max_memory_mb, 200.0);
        assert_eq!(config.monitoring.stats_retention_hours, 24);
        assert_eq!(config.monitoring.cache_hit_rate_target_percent, 80.0);
        assert!(config.rate_limit.enabled);
        assert!(config.cache.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "rate_limit:\n  per_key_interval_secs: 2.5\ncache:\n  ttl_secs: 5\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.rate_limit.per_key_interval_secs, 2.5);
        assert_eq!(config.rate_limit.global_limit_per_minute, 20);
        assert_eq!(config.cache.ttl_secs, 5);
        assert_eq!(config.cache.max_entries, 1000);
        assert_eq!(config.server.admin_listen, "127.0.0.1:9090");
    }

    #[test]
    fn overrides_apply_and_bad_values_are_ignored() {
        let vars: HashMap<&str, &str> = [
            ("MARKET_MCP_RATE_LIMIT_INTERVAL", "10"),
            ("MARKET_MCP_RATE_LIMIT_PER_SECOND", "not-a-number"),
            ("MARKET_MCP_CACHE_TTL", " 60 "),
            ("MARKET_MCP_CACHING_ENABLED", "FALSE"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.rate_limit.per_key_interval_secs, 10.0);
        assert_eq!(config.rate_limit.per_second_limit, 2);
        assert_eq!(config.cache.ttl_secs, 60);
        assert!(!config.cache.enabled);
        assert!(config.rate_limit.enabled);
    }

    #[test]
    fn validate_rejects_zero_limits() {
        let mut config = AppConfig::default();
        config.rate_limit.per_second_limit = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.cache.max_memory_mb = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.monitoring.cache_hit_rate_target_percent = 120.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_missing_file_fails() {
        assert!(AppConfig::load("/nonexistent/market-cache.yaml").is_err());
    }
}
