use std::sync::Arc;

use tracing::info;

use crate::aggregator::{AggregateStats, CancellationFlag, DescriptionContains, LineFilter, OddsAggregator};
use crate::config::Config;
use crate::error::Result;
use crate::fetcher::SportmonksClient;
use crate::fixtures::locate_fixtures;
use crate::markets::resolve_corner_markets;
use crate::types::{FixtureQuery, OddsStrategy, ResultRow};

/// Caller-side knobs for one run.
#[derive(Clone)]
pub struct RunOptions {
    /// Rows with fewer qualifying lines are dropped. Values below 1 act as 1.
    pub min_corner_lines: usize,
    /// Defaults to a description match on `Config::search_term`.
    pub filter: Option<Arc<dyn LineFilter>>,
    pub cancel: Option<CancellationFlag>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            min_corner_lines: 1,
            filter: None,
            cancel: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub fixtures_located: usize,
    pub markets_resolved: usize,
    pub below_threshold: usize,
    pub odds: AggregateStats,
}

/// Locate fixtures for `query` and return those with corner-kick odds,
/// ordered by kickoff.
pub async fn find_corner_fixtures(
    cfg: &Config,
    query: FixtureQuery,
    min_corner_lines: usize,
) -> Result<Vec<ResultRow>> {
    let opts = RunOptions {
        min_corner_lines,
        ..Default::default()
    };
    let (rows, _) = run(cfg, query, &opts).await?;
    Ok(rows)
}

/// Full pipeline: fixtures, then markets (only if the strategy can use
/// them), then per-fixture odds.
///
/// Configuration problems fail before any request. Failures of the fixture
/// or market lookups abort the run; per-fixture odds failures do not.
pub async fn run(cfg: &Config, query: FixtureQuery, opts: &RunOptions) -> Result<(Vec<ResultRow>, RunSummary)> {
    let client = SportmonksClient::new(cfg)?;
    let filter = opts
        .filter
        .clone()
        .unwrap_or_else(|| Arc::new(DescriptionContains::new(&cfg.search_term)));
    let mut summary = RunSummary::default();

    let fixtures = locate_fixtures(&client, query).await?;
    summary.fixtures_located = fixtures.len();
    if fixtures.is_empty() {
        info!(query = %query, "[PIPELINE] no fixtures with odds, nothing to aggregate");
        return Ok((Vec::new(), summary));
    }

    let markets = match cfg.odds_strategy {
        OddsStrategy::Bulk => Vec::new(),
        OddsStrategy::PerMarket | OddsStrategy::Auto => {
            resolve_corner_markets(&client, &cfg.search_term).await?
        }
    };
    summary.markets_resolved = markets.len();

    let mut aggregator = OddsAggregator::new(&client, filter)
        .strategy(cfg.odds_strategy)
        .max_markets_per_fixture(cfg.max_markets_per_fixture)
        .concurrency(cfg.effective_concurrency());
    if let Some(flag) = &opts.cancel {
        aggregator = aggregator.cancel_flag(Arc::clone(flag));
    }

    let (mut rows, odds_stats) = aggregator.build_result_rows(&fixtures, &markets).await;
    summary.odds = odds_stats;

    let threshold = opts.min_corner_lines.max(1);
    let before = rows.len();
    rows.retain(|r| r.corner_line_count >= threshold);
    summary.below_threshold = before - rows.len();

    info!(
        query = %query,
        fixtures = summary.fixtures_located,
        markets = summary.markets_resolved,
        odds_requests = summary.odds.odds_requests,
        fetch_failures = summary.odds.fetch_failures,
        cancelled = summary.odds.cancelled,
        below_threshold = summary.below_threshold,
        rows = rows.len(),
        "[PIPELINE] {} of {} fixtures have corner odds",
        rows.len(),
        summary.fixtures_located,
    );

    Ok((rows, summary))
}
