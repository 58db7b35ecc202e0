use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ComponentHealth {
    pub healthy: bool,
    pub issues: Vec<String>,
}

impl ComponentHealth {
    pub fn from_issues(issues: Vec<String>) -> Self {
        Self {
            healthy: issues.is_empty(),
            issues,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthComponents {
    pub cache: ComponentHealth,
    pub rate_limiter: ComponentHealth,
    pub request_tracker: ComponentHealth,
}

/// Combined health of the cache, limiter and tracker.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub overall_healthy: bool,
    pub timestamp: DateTime<Utc>,
    pub components: HealthComponents,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

impl HealthReport {
    pub(crate) fn new(components: HealthComponents) -> Self {
        let mut issues = Vec::new();
        let sections = [
            ("Cache", &components.cache),
            ("Rate Limiter", &components.rate_limiter),
            ("Request Tracker", &components.request_tracker),
        ];
        for (label, component) in sections {
            issues.extend(component.issues.iter().map(|issue| format!("{}: {}", label, issue)));
        }

        Self {
            overall_healthy: components.cache.healthy
                && components.rate_limiter.healthy
                && components.request_tracker.healthy,
            timestamp: Utc::now(),
            components,
            issues,
            recommendations: Vec::new(),
        }
    }
}
