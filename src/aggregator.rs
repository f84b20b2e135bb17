use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime};
use futures_util::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};

use crate::envelope::{lenient_i64, non_empty_str, unwrap_collection, unwrap_object};
use crate::error::AppError;
use crate::fetcher::SportmonksClient;
use crate::types::{Fixture, MarketDescriptor, OddsLine, OddsStrategy, ResultRow};

/// Set from outside to stop the aggregator before it fetches the next fixture.
/// Fixtures already in flight finish normally.
pub type CancellationFlag = Arc<AtomicBool>;

// ---------------------------------------------------------------------------
// Qualifying predicate
// ---------------------------------------------------------------------------

/// Decides whether a single odds line counts towards a fixture's result row.
pub trait LineFilter: Send + Sync {
    fn qualifies(&self, line: &OddsLine) -> bool;
}

/// Case-insensitive substring match on the market description.
#[derive(Debug, Clone)]
pub struct DescriptionContains {
    needle: String,
}

impl DescriptionContains {
    pub fn new(term: &str) -> Self {
        Self {
            needle: term.trim().to_lowercase(),
        }
    }
}

impl LineFilter for DescriptionContains {
    fn qualifies(&self, line: &OddsLine) -> bool {
        !self.needle.is_empty() && line.market_description.to_lowercase().contains(&self.needle)
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AggregateStats {
    pub fixtures_scanned: usize,
    pub duplicate_fixtures: usize,
    pub odds_requests: usize,
    /// Fixtures whose odds fetch failed and were counted as zero lines.
    pub fetch_failures: usize,
    pub cancelled: usize,
    pub qualified: usize,
}

/// A per-fixture odds fetch that failed. Absorbed, never returned to callers.
#[derive(Debug)]
struct PartialFetchFailure {
    fixture_id: i64,
    source: AppError,
}

enum FixtureOutcome {
    Lines(usize),
    Failed(PartialFetchFailure),
    Cancelled,
}

/// Which odds endpoint(s) are hit for each fixture.
#[derive(Debug, Clone, Copy)]
enum FetchPlan<'m> {
    Bulk,
    PerMarket(&'m [MarketDescriptor]),
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Turns a fixture list into result rows by querying pre-match odds.
///
/// Cost is O(fixtures) requests in bulk mode and O(fixtures × markets) in
/// per-market mode, so this stage dominates latency and rate-limit usage.
/// `max_markets_per_fixture` caps the per-market fan-out and `concurrency`
/// bounds how many fixtures are in flight.
pub struct OddsAggregator<'a> {
    client: &'a SportmonksClient,
    filter: Arc<dyn LineFilter>,
    strategy: OddsStrategy,
    max_markets_per_fixture: usize,
    concurrency: usize,
    cancel: Option<CancellationFlag>,
}

impl<'a> OddsAggregator<'a> {
    pub fn new(client: &'a SportmonksClient, filter: Arc<dyn LineFilter>) -> Self {
        Self {
            client,
            filter,
            strategy: OddsStrategy::Auto,
            max_markets_per_fixture: crate::config::DEFAULT_MAX_MARKETS_PER_FIXTURE,
            concurrency: crate::config::DEFAULT_CONCURRENCY,
            cancel: None,
        }
    }

    pub fn strategy(mut self, strategy: OddsStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn max_markets_per_fixture(mut self, cap: usize) -> Self {
        self.max_markets_per_fixture = cap.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn cancel_flag(mut self, flag: CancellationFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// One row per fixture with at least one qualifying odds line, sorted by
    /// kickoff. A failed fetch drops that fixture only.
    pub async fn build_result_rows(
        &self,
        fixtures: &[Fixture],
        markets: &[MarketDescriptor],
    ) -> (Vec<ResultRow>, AggregateStats) {
        let mut stats = AggregateStats::default();

        let mut seen = HashSet::new();
        let unique: Vec<&Fixture> = fixtures.iter().filter(|f| seen.insert(f.id)).collect();
        stats.duplicate_fixtures = fixtures.len() - unique.len();

        let plan = self.plan(markets);
        debug!(?plan, fixtures = unique.len(), concurrency = self.concurrency, "[ODDS] fetch plan");

        // `buffered` yields in input order, so outcomes line up with `unique`.
        let outcomes: Vec<(FixtureOutcome, usize)> = stream::iter(unique.iter().copied())
            .map(|fixture| self.fetch_fixture(fixture, plan))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut counts = Vec::with_capacity(unique.len());
        for (outcome, requests) in outcomes {
            stats.odds_requests += requests;
            let count = match outcome {
                FixtureOutcome::Lines(n) => {
                    stats.fixtures_scanned += 1;
                    n
                }
                FixtureOutcome::Failed(failure) => {
                    stats.fixtures_scanned += 1;
                    stats.fetch_failures += 1;
                    debug!(
                        fixture_id = failure.fixture_id,
                        "[ODDS] odds fetch failed, counting as no corner odds: {}",
                        failure.source,
                    );
                    0
                }
                FixtureOutcome::Cancelled => {
                    stats.cancelled += 1;
                    0
                }
            };
            counts.push(count);
        }

        let rows = assemble_rows(&unique, &counts);
        stats.qualified = rows.len();
        (rows, stats)
    }

    fn plan<'m>(&self, markets: &'m [MarketDescriptor]) -> FetchPlan<'m> {
        match self.strategy {
            OddsStrategy::Bulk => FetchPlan::Bulk,
            OddsStrategy::Auto if markets.is_empty() => FetchPlan::Bulk,
            OddsStrategy::PerMarket if markets.is_empty() => {
                warn!("[ODDS] per-market strategy requested but no markets resolved; using bulk odds");
                FetchPlan::Bulk
            }
            OddsStrategy::Auto | OddsStrategy::PerMarket => {
                if markets.len() > self.max_markets_per_fixture {
                    warn!(
                        "[ODDS] {} corner markets resolved, querying only the first {} per fixture",
                        markets.len(),
                        self.max_markets_per_fixture,
                    );
                }
                let cap = markets.len().min(self.max_markets_per_fixture);
                FetchPlan::PerMarket(&markets[..cap])
            }
        }
    }

    /// Returns the outcome and the number of requests issued for it.
    async fn fetch_fixture(&self, fixture: &Fixture, plan: FetchPlan<'_>) -> (FixtureOutcome, usize) {
        if self.cancel.as_ref().is_some_and(|c| c.load(Ordering::Relaxed)) {
            return (FixtureOutcome::Cancelled, 0);
        }

        match plan {
            FetchPlan::Bulk => {
                let fixture_seg = fixture.id.to_string();
                let result = self
                    .client
                    .get_football(&["odds", "pre-match", "fixtures", &fixture_seg], &[])
                    .await;
                let outcome = match result {
                    Ok(body) => {
                        let lines = parse_odds_lines(body, fixture.id, None);
                        FixtureOutcome::Lines(self.count_qualifying(&lines))
                    }
                    Err(source) => FixtureOutcome::Failed(PartialFetchFailure {
                        fixture_id: fixture.id,
                        source,
                    }),
                };
                (outcome, 1)
            }
            FetchPlan::PerMarket(markets) => {
                let fixture_seg = fixture.id.to_string();
                let mut total = 0usize;
                let mut requests = 0usize;
                for market in markets {
                    let market_seg = market.id.to_string();
                    requests += 1;
                    let result = self
                        .client
                        .get_football(
                            &["odds", "pre-match", "fixtures", &fixture_seg, "markets", &market_seg],
                            &[],
                        )
                        .await;
                    match result {
                        Ok(body) => {
                            let lines = parse_odds_lines(body, fixture.id, Some(market));
                            total += self.count_qualifying(&lines);
                        }
                        Err(source) => {
                            let failure = PartialFetchFailure {
                                fixture_id: fixture.id,
                                source,
                            };
                            return (FixtureOutcome::Failed(failure), requests);
                        }
                    }
                }
                (FixtureOutcome::Lines(total), requests)
            }
        }
    }

    fn count_qualifying(&self, lines: &[OddsLine]) -> usize {
        lines.iter().filter(|l| self.filter.qualifies(l)).count()
    }
}

impl std::fmt::Debug for OddsAggregator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OddsAggregator")
            .field("strategy", &self.strategy)
            .field("max_markets_per_fixture", &self.max_markets_per_fixture)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Parsing and assembly
// ---------------------------------------------------------------------------

/// Decode an odds response into lines for `fixture_id`.
///
/// The description is read from `market_description`, then `description`,
/// then an embedded `market.name`. When the request targeted a single market,
/// lines without any description inherit that market's name.
pub fn parse_odds_lines(body: Value, fixture_id: i64, market: Option<&MarketDescriptor>) -> Vec<OddsLine> {
    let (_, items) = unwrap_collection(body);
    items
        .iter()
        .filter(|v| v.is_object())
        .map(|v| {
            let market_description = non_empty_str(v, "market_description")
                .or_else(|| non_empty_str(v, "description"))
                .or_else(|| {
                    v.get("market")
                        .and_then(unwrap_object)
                        .and_then(|m| non_empty_str(m, "name"))
                })
                .or_else(|| market.map(|m| m.name.clone()))
                .unwrap_or_default();
            OddsLine {
                fixture_id: v.get("fixture_id").and_then(lenient_i64).unwrap_or(fixture_id),
                market_id: v
                    .get("market_id")
                    .and_then(lenient_i64)
                    .or_else(|| market.map(|m| m.id)),
                market_description,
            }
        })
        .filter(|line| line.fixture_id == fixture_id)
        .collect()
}

/// Pair fixtures with their qualifying line counts, drop zero counts and sort
/// by kickoff. The sort is stable, so equal kickoffs keep fixture order.
pub fn assemble_rows(fixtures: &[&Fixture], counts: &[usize]) -> Vec<ResultRow> {
    let mut seen = HashSet::new();
    let mut rows: Vec<ResultRow> = fixtures
        .iter()
        .zip(counts)
        .filter(|(_, &count)| count >= 1)
        .filter(|(f, _)| seen.insert(f.id))
        .map(|(f, &count)| ResultRow::from_fixture(f, count))
        .collect();

    rows.sort_by_key(|r| kickoff_sort_key(&r.starting_at));
    rows
}

/// Parsed kickoffs first (chronological), then unparseable ones by raw text.
fn kickoff_sort_key(raw: &str) -> (bool, Option<NaiveDateTime>, String) {
    match parse_kickoff(raw) {
        Some(dt) => (false, Some(dt), String::new()),
        None => (true, None, raw.to_string()),
    }
}

pub fn parse_kickoff(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    const FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
}
