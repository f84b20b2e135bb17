use std::str::FromStr;

use chrono::NaiveDate;

use crate::error::{AppError, Result};
use crate::types::{FixtureQuery, OddsStrategy};

pub const FOOTBALL_API_URL: &str = "https://api.sportmonks.com/v3/football";
pub const ODDS_API_URL: &str = "https://api.sportmonks.com/v3/odds";

/// Per-request timeout (seconds). No request is retried.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Substring used to recognise corner-kick markets.
pub const DEFAULT_SEARCH_TERM: &str = "corner";

/// Cap on per-market odds calls issued for a single fixture.
pub const DEFAULT_MAX_MARKETS_PER_FIXTURE: usize = 10;

/// Fixtures fetched in parallel by the odds aggregator. 1 keeps it sequential.
pub const DEFAULT_CONCURRENCY: usize = 1;
pub const MAX_CONCURRENCY: usize = 16;

/// Upstream response bodies are cut to this many chars inside error messages.
pub const ERROR_BODY_MAX_CHARS: usize = 300;

/// Embedded relations requested alongside fixtures, to avoid one call per fixture.
pub const FIXTURE_DATE_INCLUDE: &str = "league;participants";
pub const ROUND_INCLUDE: &str = "fixtures.league;fixtures.participants";

#[derive(Debug, Clone)]
pub struct Config {
    /// Sportmonks API token, sent as `api_token` on every request.
    pub api_token: String,
    pub football_api_url: String,
    pub odds_api_url: String,
    pub log_level: String,
    pub http_timeout_secs: u64,
    /// Market-name substring (CORNERS_SEARCH_TERM)
    pub search_term: String,
    /// Bulk vs per-market odds fetching (CORNERS_ODDS_STRATEGY)
    pub odds_strategy: OddsStrategy,
    /// Max per-market calls for one fixture (CORNERS_MAX_MARKETS_PER_FIXTURE)
    pub max_markets_per_fixture: usize,
    /// Fixtures in flight at once (CORNERS_CONCURRENCY)
    pub concurrency: usize,
}

impl Config {
    /// Defaults for everything except the credential.
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            football_api_url: FOOTBALL_API_URL.to_string(),
            odds_api_url: ODDS_API_URL.to_string(),
            log_level: "info".to_string(),
            http_timeout_secs: HTTP_TIMEOUT_SECS,
            search_term: DEFAULT_SEARCH_TERM.to_string(),
            odds_strategy: OddsStrategy::Auto,
            max_markets_per_fixture: DEFAULT_MAX_MARKETS_PER_FIXTURE,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_token = std::env::var("SPORTMONKS_API_TOKEN").unwrap_or_default();
        if api_token.trim().is_empty() {
            return Err(AppError::Config(
                "SPORTMONKS_API_TOKEN must be set".to_string(),
            ));
        }

        let odds_strategy = match std::env::var("CORNERS_ODDS_STRATEGY") {
            Ok(s) => s.parse::<OddsStrategy>().map_err(AppError::Config)?,
            Err(_) => OddsStrategy::Auto,
        };

        Ok(Self {
            api_token,
            football_api_url: std::env::var("SPORTMONKS_FOOTBALL_API_URL")
                .unwrap_or_else(|_| FOOTBALL_API_URL.to_string()),
            odds_api_url: std::env::var("SPORTMONKS_ODDS_API_URL")
                .unwrap_or_else(|_| ODDS_API_URL.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            http_timeout_secs: env_parse("HTTP_TIMEOUT_SECS", HTTP_TIMEOUT_SECS)?,
            search_term: std::env::var("CORNERS_SEARCH_TERM")
                .unwrap_or_else(|_| DEFAULT_SEARCH_TERM.to_string()),
            odds_strategy,
            max_markets_per_fixture: env_parse(
                "CORNERS_MAX_MARKETS_PER_FIXTURE",
                DEFAULT_MAX_MARKETS_PER_FIXTURE,
            )?,
            concurrency: env_parse("CORNERS_CONCURRENCY", DEFAULT_CONCURRENCY)?,
        })
    }

    /// Concurrency clamped to `1..=MAX_CONCURRENCY`.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.clamp(1, MAX_CONCURRENCY)
    }
}

/// What the `corners` binary should look up, read from CORNERS_MODE,
/// CORNERS_DATE / CORNERS_ROUND_ID and CORNERS_MIN_LINES.
pub fn query_from_env() -> Result<(FixtureQuery, usize)> {
    let mode = std::env::var("CORNERS_MODE").unwrap_or_else(|_| "date".to_string());
    let query = match mode.trim().to_lowercase().as_str() {
        "date" => {
            let date = match std::env::var("CORNERS_DATE") {
                Ok(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
                    AppError::Config(format!("CORNERS_DATE must be YYYY-MM-DD, got {s:?}"))
                })?,
                Err(_) => chrono::Local::now().date_naive(),
            };
            FixtureQuery::ByDate(date)
        }
        "round" => {
            let raw = std::env::var("CORNERS_ROUND_ID").map_err(|_| {
                AppError::Config("CORNERS_ROUND_ID must be set when CORNERS_MODE=round".to_string())
            })?;
            let id = raw.trim().parse::<i64>().map_err(|_| {
                AppError::Config(format!("CORNERS_ROUND_ID must be an integer, got {raw:?}"))
            })?;
            FixtureQuery::ByRound(id)
        }
        other => {
            return Err(AppError::Config(format!(
                "CORNERS_MODE must be \"date\" or \"round\", got {other:?}"
            )))
        }
    };
    let min_lines = env_parse("CORNERS_MIN_LINES", 1usize)?;
    Ok((query, min_lines))
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw:?}"))),
        Err(_) => Ok(default),
    }
}
