pub mod admin;
pub mod cache;
pub mod health;
pub mod metrics;
pub mod stats;
