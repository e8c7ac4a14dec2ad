//! Core library for octostat
//!
//! This library keeps locally displayed GitHub statistics (profile,
//! repositories, languages, traffic) synchronized with the GitHub REST API
//! under its externally imposed rate limits.
//!
//! # Module Organization
//!
//! - [`config`]: Static client configuration (token, TTLs, retry tuning)
//! - [`stats`]: The acquisition layer: cache, rate tracking, retrying
//!   fetchers, and the aggregating client facade

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod config;
pub mod stats;

pub use config::StatsConfig;
pub use stats::StatsClient;
