use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Markets
// ---------------------------------------------------------------------------

/// One betting-market type as listed by the market-search endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketDescriptor {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub developer_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    pub id: i64,
    pub starting_at: String,
    pub league_name: Option<String>,
    pub home_team_name: Option<String>,
    pub away_team_name: Option<String>,
    pub has_odds: bool,
}

/// How the fixture list for one pipeline run is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureQuery {
    ByDate(NaiveDate),
    ByRound(i64),
}

impl std::fmt::Display for FixtureQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FixtureQuery::ByDate(d) => write!(f, "date {}", d.format("%Y-%m-%d")),
            FixtureQuery::ByRound(id) => write!(f, "round {id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Odds
// ---------------------------------------------------------------------------

/// A single pre-match odds entry. Only lives long enough to be counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OddsLine {
    pub fixture_id: i64,
    pub market_id: Option<i64>,
    pub market_description: String,
}

/// How odds are requested for each fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OddsStrategy {
    /// One call per fixture for all pre-match odds, filtered by description.
    Bulk,
    /// One call per resolved corner market per fixture.
    PerMarket,
    /// PerMarket when markets were resolved, Bulk otherwise.
    Auto,
}

impl FromStr for OddsStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bulk" => Ok(OddsStrategy::Bulk),
            "per_market" | "per-market" | "permarket" => Ok(OddsStrategy::PerMarket),
            "auto" | "" => Ok(OddsStrategy::Auto),
            other => Err(format!(
                "odds strategy must be one of auto, bulk, per_market; got {other:?}"
            )),
        }
    }
}

impl std::fmt::Display for OddsStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OddsStrategy::Bulk => "bulk",
            OddsStrategy::PerMarket => "per_market",
            OddsStrategy::Auto => "auto",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One qualifying fixture. `corner_line_count` is always >= 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub fixture_id: i64,
    pub starting_at: String,
    pub league_name: Option<String>,
    pub home_team_name: Option<String>,
    pub away_team_name: Option<String>,
    pub corner_line_count: usize,
}

impl ResultRow {
    pub fn from_fixture(fixture: &Fixture, corner_line_count: usize) -> Self {
        Self {
            fixture_id: fixture.id,
            starting_at: fixture.starting_at.clone(),
            league_name: fixture.league_name.clone(),
            home_team_name: fixture.home_team_name.clone(),
            away_team_name: fixture.away_team_name.clone(),
            corner_line_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_parses_aliases() {
        assert_eq!("BULK".parse::<OddsStrategy>(), Ok(OddsStrategy::Bulk));
        assert_eq!("per-market".parse::<OddsStrategy>(), Ok(OddsStrategy::PerMarket));
        assert_eq!(" auto ".parse::<OddsStrategy>(), Ok(OddsStrategy::Auto));
        assert!("fastest".parse::<OddsStrategy>().is_err());
    }

    #[test]
    fn query_display() {
        let d = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(FixtureQuery::ByDate(d).to_string(), "date 2024-05-01");
        assert_eq!(FixtureQuery::ByRound(339_190).to_string(), "round 339190");
    }
}
