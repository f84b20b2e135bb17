//! Finds football fixtures that carry corner-kick betting markets on the
//! Sportmonks API and flattens them into one row per fixture.

pub mod aggregator;
pub mod config;
pub mod envelope;
pub mod error;
pub mod fetcher;
pub mod fixtures;
pub mod markets;
pub mod pipeline;
pub mod types;

pub use config::Config;
pub use error::{AppError, Result};
pub use pipeline::{find_corner_fixtures, run, RunOptions, RunSummary};
pub use types::{Fixture, FixtureQuery, MarketDescriptor, OddsStrategy, ResultRow};
