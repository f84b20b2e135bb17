use serde_json::Value;
use tracing::{debug, info};

use crate::envelope::{lenient_i64, non_empty_str, unwrap_collection, EnvelopeShape};
use crate::error::{AppError, Result};
use crate::fetcher::SportmonksClient;
use crate::types::MarketDescriptor;

/// Look up every betting market whose name contains `search_term`
/// (case-insensitive). One request, no retry.
///
/// An empty result is not an error: the aggregator then falls back to
/// filtering bulk odds by description. A body that is valid JSON but holds no
/// recognizable market list is reported as a `TransientApi` error, since this
/// call is required.
pub async fn resolve_corner_markets(
    client: &SportmonksClient,
    search_term: &str,
) -> Result<Vec<MarketDescriptor>> {
    let term = search_term.trim().to_lowercase();
    if term.is_empty() {
        return Err(AppError::Config("market search term is empty".to_string()));
    }

    let body = client.get_odds(&["markets", "search", &term], &[]).await?;
    let raw = body.to_string();
    let (shape, items) = unwrap_collection(body);
    if matches!(shape, EnvelopeShape::Unrecognized | EnvelopeShape::Absent) {
        return Err(AppError::transient(
            &format!("/markets/search/{term}"),
            Some(200),
            &raw,
        ));
    }

    let api_total = items.len();
    let markets = filter_markets(&items, &term);
    info!(
        term = %term,
        api_total,
        matched = markets.len(),
        "[MARKETS] {} of {api_total} markets match {term:?}",
        markets.len(),
    );
    Ok(markets)
}

/// Keep the entries whose name contains `term`; deduplicated and ordered by id.
pub fn filter_markets(items: &[Value], term: &str) -> Vec<MarketDescriptor> {
    let needle = term.to_lowercase();
    let mut markets: Vec<MarketDescriptor> = items
        .iter()
        .filter_map(parse_market)
        .filter(|m| m.name.to_lowercase().contains(&needle))
        .collect();

    markets.sort_by_key(|m| m.id);
    markets.dedup_by_key(|m| m.id);
    markets
}

fn parse_market(v: &Value) -> Option<MarketDescriptor> {
    let id = v.get("id").and_then(lenient_i64);
    let name = non_empty_str(v, "name");
    let (Some(id), Some(name)) = (id, name) else {
        debug!("[MARKETS] skipping entry without id/name: {v}");
        return None;
    };
    Some(MarketDescriptor {
        id,
        name,
        developer_name: non_empty_str(v, "developer_name"),
    })
}
