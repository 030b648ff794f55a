//! Composes loading, joining, aggregation and presentation into one run.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::analyzers::aggregate::aggregate_regions;
use crate::analyzers::join::join;
use crate::config::{AppConfig, FetchConfig};
use crate::fetch::{BasicClient, HttpClient};
use crate::inspections::{ParsedInspections, load_inspections};
use crate::present::{ChoroplethMap, present};
use crate::regions::{Region, load_regions};
use crate::stats::LoadStats;

/// Builds the HTTP client described by the fetch settings.
pub fn client_for(fetch: &FetchConfig) -> Result<BasicClient> {
    match fetch.timeout_secs {
        Some(secs) => BasicClient::with_timeout(Duration::from_secs(secs))
            .context("Failed to build HTTP client"),
        None => Ok(BasicClient::new()),
    }
}

/// Fetches both datasets and renders the choropleth.
///
/// Either fetch failing fails the whole run; nothing partial is returned.
#[tracing::instrument(skip_all, fields(kind = ?config.regions.kind, join = ?config.regions.join))]
pub async fn run<C: HttpClient>(config: &AppConfig, client: &C) -> Result<ChoroplethMap> {
    let (regions, inspections) = fetch_datasets(config, client).await?;
    build_map(config, regions, inspections)
}

/// Loads the region and inspection datasets.
///
/// The two sources are independent and are fetched concurrently unless
/// `fetch.sequential` asks for regions first.
pub async fn fetch_datasets<C: HttpClient>(
    config: &AppConfig,
    client: &C,
) -> Result<(Vec<Region>, ParsedInspections)> {
    let id_fields = config.regions.identifier_fields();
    let regions = load_regions(client, &config.sources.regions, &id_fields);
    let inspections = load_inspections(
        client,
        &config.sources.inspections,
        config.inspections.duplicates,
        config.regions.join,
    );

    if config.fetch.sequential {
        let regions = regions.await?;
        let inspections = inspections.await?;
        Ok((regions, inspections))
    } else {
        tokio::try_join!(regions, inspections)
    }
}

/// Joins, aggregates and colors already-loaded datasets.
pub fn build_map(
    config: &AppConfig,
    regions: Vec<Region>,
    inspections: ParsedInspections,
) -> Result<ChoroplethMap> {
    if regions.is_empty() {
        warn!("Region dataset is empty; the map will have no overlay");
    }

    let outcome = join(config.regions.join, &regions, &inspections.records);
    let summaries = aggregate_regions(&outcome.index);
    let stats = LoadStats::from_load(&inspections, &outcome, &summaries);

    info!(
        regions = stats.regions,
        regions_with_data = stats.regions_with_data,
        attributed = stats.attributed,
        unmatched = stats.unmatched,
        unique_businesses = stats.unique_businesses,
        attributed_pct = stats.attributed_pct(),
        coverage_pct = stats.coverage_pct(),
        "Region scores aggregated"
    );

    present(config, regions, summaries, stats)
}
