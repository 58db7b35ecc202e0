pub mod config;
pub mod error;

pub use config::{AppConfig, CacheConfig, MonitoringConfig, RateLimitConfig, ServerConfig};
pub use error::{lock_or_recover, CacheError, CacheResult};
