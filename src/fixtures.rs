use chrono::{DateTime, NaiveDate};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{FIXTURE_DATE_INCLUDE, ROUND_INCLUDE};
use crate::envelope::{collection_at, lenient_i64, non_empty_str, unwrap_collection, unwrap_object};
use crate::error::Result;
use crate::fetcher::SportmonksClient;
use crate::types::{Fixture, FixtureQuery};

/// How strictly the `has_odds` flag is applied client-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OddsFlagFilter {
    /// The server already filtered; only drop fixtures explicitly flagged false.
    RejectExplicitFalse,
    /// The server cannot filter; keep only fixtures flagged true.
    RequireTrue,
}

#[derive(Debug, Default)]
pub struct LocateStats {
    pub api_total: usize,
    pub rejected_malformed: usize,
    pub rejected_no_odds: usize,
}

pub async fn locate_fixtures(client: &SportmonksClient, query: FixtureQuery) -> Result<Vec<Fixture>> {
    match query {
        FixtureQuery::ByDate(date) => fixtures_by_date(client, date).await,
        FixtureQuery::ByRound(round_id) => fixtures_by_round(client, round_id).await,
    }
}

/// Fixtures scheduled on `date` that have odds, with league and participants
/// embedded in the same response.
pub async fn fixtures_by_date(client: &SportmonksClient, date: NaiveDate) -> Result<Vec<Fixture>> {
    let day = date.format("%Y-%m-%d").to_string();
    let body = client
        .get_football(
            &["fixtures", "date", &day],
            &[("filters", "havingOdds"), ("include", FIXTURE_DATE_INCLUDE)],
        )
        .await?;

    let (shape, items) = unwrap_collection(body);
    let (fixtures, stats) = normalize_fixtures(items, OddsFlagFilter::RejectExplicitFalse);
    info!(
        date = %day,
        ?shape,
        api_total = stats.api_total,
        kept = fixtures.len(),
        "[FIXTURES] {} fixtures with odds on {day}",
        fixtures.len(),
    );
    log_rejections(&stats);
    Ok(fixtures)
}

/// Fixtures of one competition round. The round endpoint has no odds filter,
/// so fixtures not flagged `has_odds` are dropped here.
pub async fn fixtures_by_round(client: &SportmonksClient, round_id: i64) -> Result<Vec<Fixture>> {
    let round_seg = round_id.to_string();
    let body = client
        .get_football(&["rounds", &round_seg], &[("include", ROUND_INCLUDE)])
        .await?;

    let items = round_fixture_items(&body);
    let (fixtures, stats) = normalize_fixtures(items, OddsFlagFilter::RequireTrue);
    info!(
        round_id,
        api_total = stats.api_total,
        kept = fixtures.len(),
        "[FIXTURES] {} fixtures with odds in round {round_id}",
        fixtures.len(),
    );
    log_rejections(&stats);
    Ok(fixtures)
}

/// Pull the fixture collection out of a round response.
///
/// Shapes seen in the wild, all handled:
/// - `{"data": {"fixtures": [...]}}`
/// - `{"data": {"fixtures": {"data": [...]}}}`
/// - `{"data": {"fixtures": {"data": {"data": [...]}}}}`
/// - the round object without the outer `data` key
pub fn round_fixture_items(body: &Value) -> Vec<Value> {
    match unwrap_object(body) {
        Some(round) => collection_at(round, "fixtures"),
        None => {
            debug!("[FIXTURES] round response is not an object");
            Vec::new()
        }
    }
}

/// Shared normalization for both locator entry points.
pub fn normalize_fixtures(items: Vec<Value>, flag_filter: OddsFlagFilter) -> (Vec<Fixture>, LocateStats) {
    let mut stats = LocateStats {
        api_total: items.len(),
        ..Default::default()
    };
    let mut fixtures = Vec::with_capacity(items.len());

    for item in &items {
        let Some(id) = item.get("id").and_then(lenient_i64) else {
            stats.rejected_malformed += 1;
            debug!("[FIXTURES] skipping item without integer id: {item}");
            continue;
        };

        let flag = parse_has_odds(item);
        let keep = match flag_filter {
            OddsFlagFilter::RejectExplicitFalse => flag != Some(false),
            OddsFlagFilter::RequireTrue => flag == Some(true),
        };
        if !keep {
            stats.rejected_no_odds += 1;
            continue;
        }

        let (home_team_name, away_team_name) = resolve_teams(item);
        fixtures.push(Fixture {
            id,
            starting_at: parse_starting_at(item),
            league_name: item
                .get("league")
                .and_then(unwrap_object)
                .and_then(|l| non_empty_str(l, "name")),
            home_team_name,
            away_team_name,
            has_odds: true,
        });
    }

    (fixtures, stats)
}

fn log_rejections(stats: &LocateStats) {
    if stats.rejected_malformed > 0 || stats.rejected_no_odds > 0 {
        debug!(
            "[FIXTURES] rejected: malformed={} no_odds={}",
            stats.rejected_malformed, stats.rejected_no_odds,
        );
    }
}

/// `has_odds` as a bool or 0/1. `None` when missing or anything else.
fn parse_has_odds(item: &Value) -> Option<bool> {
    let v = item.get("has_odds")?;
    v.as_bool().or_else(|| match v.as_i64() {
        Some(0) => Some(false),
        Some(1) => Some(true),
        _ => None,
    })
}

/// Kickoff as delivered, or rebuilt from `starting_at_timestamp` when the
/// string form is missing. Empty if neither is present.
fn parse_starting_at(item: &Value) -> String {
    if let Some(s) = non_empty_str(item, "starting_at") {
        return s;
    }
    item.get("starting_at_timestamp")
        .and_then(lenient_i64)
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Home/away team names from the participants collection. The location tag
/// lives under `meta.location` (v3) or directly on the participant.
fn resolve_teams(item: &Value) -> (Option<String>, Option<String>) {
    let mut home = None;
    let mut away = None;

    for p in collection_at(item, "participants") {
        let location = p
            .get("meta")
            .and_then(|m| m.get("location"))
            .or_else(|| p.get("location"))
            .and_then(|l| l.as_str())
            .map(|l| l.trim().to_lowercase());

        let slot = match location.as_deref() {
            Some("home") => &mut home,
            Some("away") => &mut away,
            _ => continue,
        };
        if slot.is_none() {
            *slot = non_empty_str(&p, "name");
        }
    }

    (home, away)
}
