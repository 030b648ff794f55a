//! Output formatting and persistence for a rendered choropleth.
//!
//! Writes the standalone map page, the enriched GeoJSON, and a per-region CSV,
//! and logs summaries in pretty or JSON form.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::PresentationConfig;
use crate::present::{ChoroplethMap, escape_html};
use crate::stats::LoadStats;

const PAGE_TEMPLATE: &str = include_str!("templates/map.html");

/// Files produced by [`write_outputs`].
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub page: PathBuf,
    pub geojson: PathBuf,
    pub csv: PathBuf,
}

/// View settings handed to the page script.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageView<'a> {
    center: [f64; 2],
    zoom: u8,
    tile_url: &'a str,
    attribution: &'a str,
    outline_color: &'a str,
    outline_weight: f64,
    highlight_weight: f64,
    fill_opacity: f64,
    /// Kept inspection records; a click logs how many fell outside the region.
    records_with_scores: usize,
    /// Leaflet order: `[[south, west], [north, east]]`.
    bounds: Option<[[f64; 2]; 2]>,
}

/// One CSV row per region.
#[derive(Debug, Serialize)]
struct RegionRow<'a> {
    region_id: usize,
    name: &'a str,
    average_inspection_score: Option<f64>,
    fill_color: &'a str,
    business_count: usize,
    highest_score: Option<f64>,
    highest_business: Option<&'a str>,
    lowest_score: Option<f64>,
    lowest_business: Option<&'a str>,
}

/// Logs load statistics using Rust's debug pretty-print format.
pub fn print_pretty(stats: &LoadStats) {
    debug!("{:#?}", stats);
}

/// Logs any serializable value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Logs one line per region with its average and fill.
pub fn log_regions(map: &ChoroplethMap) {
    for region in &map.regions {
        info!(
            region_id = region.id.0,
            name = %region.name,
            average = ?region.summary.average,
            business_count = region.summary.business_count,
            fill = %region.fill_color,
            "Region"
        );
    }
}

/// Renders the standalone HTML page for `map`.
pub fn render_page(map: &ChoroplethMap, presentation: &PresentationConfig) -> Result<String> {
    let view = PageView {
        center: presentation.center,
        zoom: presentation.zoom,
        tile_url: &presentation.tile_url,
        attribution: &presentation.attribution,
        outline_color: &presentation.outline_color,
        outline_weight: presentation.outline_weight,
        highlight_weight: presentation.highlight_weight,
        fill_opacity: presentation.fill_opacity,
        records_with_scores: map.stats.inspections_kept,
        bounds: map
            .bounds
            .map(|b| [[b.min().y, b.min().x], [b.max().y, b.max().x]]),
    };

    let title = escape_html(&presentation.title.replace("<br>", " "));

    let geojson = script_json(&map.feature_collection())?;
    let view = script_json(&view)?;
    let legend = script_json(&map.legend.to_html())?;

    Ok(fill_template(
        PAGE_TEMPLATE,
        &[
            ("TITLE", &title),
            ("GEOJSON", &geojson),
            ("VIEW", &view),
            ("LEGEND", &legend),
        ],
    ))
}

/// Substitutes `{{NAME}}` placeholders in a single pass over `template`.
///
/// Inserted values are not scanned again. Unknown placeholders are kept as is.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut page = String::with_capacity(
        template.len() + values.iter().map(|(_, v)| v.len()).sum::<usize>(),
    );
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        page.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            rest = &rest[start..];
            break;
        };
        let name = &after[..end];
        match values.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => page.push_str(value),
            None => page.push_str(&rest[start..start + end + 4]),
        }
        rest = &after[end + 2..];
    }

    page.push_str(rest);
    page
}

/// JSON safe to inline inside a `<script>` element.
fn script_json(value: &impl Serialize) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

pub fn write_geojson(path: &Path, map: &ChoroplethMap) -> Result<()> {
    let body = serde_json::to_string_pretty(&map.feature_collection())?;
    fs::write(path, body).with_context(|| format!("Failed to write {:?}", path))
}

/// Writes the per-region CSV, replacing any previous file.
pub fn write_region_csv(path: &Path, map: &ChoroplethMap) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("Failed to create {:?}", path))?;

    for region in &map.regions {
        let summary = &region.summary;
        writer.serialize(RegionRow {
            region_id: region.id.0,
            name: &region.name,
            average_inspection_score: summary.average,
            fill_color: &region.fill_color,
            business_count: summary.business_count,
            highest_score: summary.highest.as_ref().map(|e| e.score),
            highest_business: summary.highest.as_ref().map(|e| e.business_name.as_str()),
            lowest_score: summary.lowest.as_ref().map(|e| e.score),
            lowest_business: summary.lowest.as_ref().map(|e| e.business_name.as_str()),
        })?;
    }
    writer.flush()?;

    Ok(())
}

/// Writes `index.html`, `regions.geojson` and `region_scores.csv` into `dir`.
pub fn write_outputs(
    dir: &Path,
    map: &ChoroplethMap,
    presentation: &PresentationConfig,
) -> Result<OutputPaths> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;

    let paths = OutputPaths {
        page: dir.join("index.html"),
        geojson: dir.join("regions.geojson"),
        csv: dir.join("region_scores.csv"),
    };

    let page = render_page(map, presentation)?;
    fs::write(&paths.page, page).with_context(|| format!("Failed to write {:?}", paths.page))?;
    write_geojson(&paths.geojson, map)?;
    write_region_csv(&paths.csv, map)?;

    info!(dir = %dir.display(), "Map outputs written");
    Ok(paths)
}
