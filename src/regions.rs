//! Region loader: boundary polygons for neighborhoods or zip codes.
//!
//! The open-data portals publish boundaries as a JSON array of records, each
//! with an identifier field and a geometry object (`the_geom` on Socrata)
//! carrying `coordinates` as a Polygon or MultiPolygon ring structure.

use anyhow::{Context, Result};
use geo::{LineString, MultiPolygon, Polygon};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::fetch::{HttpClient, load_source};

const GEOMETRY_FIELDS: &[&str] = &["the_geom", "geometry"];

/// Stable region key, assigned in load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RegionId(pub usize);

#[derive(Debug, Clone)]
pub struct Region {
    pub id: RegionId,
    /// Neighborhood name or postal code.
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

/// Fetches and parses the boundary dataset at `source`.
#[tracing::instrument(skip(client, id_fields), fields(source = %source))]
pub async fn load_regions<C: HttpClient>(
    client: &C,
    source: &str,
    id_fields: &[String],
) -> Result<Vec<Region>> {
    let bytes = load_source(client, source)
        .await
        .context("Failed to load region boundaries")?;
    let regions = parse_regions(&bytes, id_fields)?;
    info!(regions = regions.len(), "Region boundaries loaded");
    Ok(regions)
}

/// Parses a JSON array of boundary records into [`Region`]s.
///
/// `id_fields` are tried in order; the first one holding a non-blank string
/// or a number names the region. Records without a usable identifier or
/// polygon are skipped.
///
/// # Errors
///
/// Returns an error if `bytes` is not a JSON array.
pub fn parse_regions(bytes: &[u8], id_fields: &[String]) -> Result<Vec<Region>> {
    let records: Vec<Value> =
        serde_json::from_slice(bytes).context("Region data is not a JSON array")?;

    let mut regions = Vec::with_capacity(records.len());
    let mut skipped = 0usize;

    for (position, record) in records.iter().enumerate() {
        let Some(name) = id_fields.iter().find_map(|f| identifier(&record[f.as_str()])) else {
            debug!(position, "Region record has no identifier");
            skipped += 1;
            continue;
        };

        let geometry = GEOMETRY_FIELDS
            .iter()
            .find_map(|f| record.get(*f))
            .and_then(parse_geometry);

        match geometry {
            Some(geometry) => regions.push(Region {
                id: RegionId(regions.len()),
                name,
                geometry,
            }),
            None => {
                debug!(position, name = %name, "Region record has no usable polygon");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, kept = regions.len(), "Skipped malformed region records");
    }

    Ok(regions)
}

/// Reads an identifier value, accepting strings and numbers.
pub(crate) fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Converts a geometry object into a non-empty [`MultiPolygon`].
///
/// The `type` member decides between Polygon and MultiPolygon coordinates;
/// without it, the nesting depth of `coordinates` does.
fn parse_geometry(geometry: &Value) -> Option<MultiPolygon<f64>> {
    let coordinates = geometry.get("coordinates")?;
    let kind = geometry.get("type").and_then(Value::as_str);

    let multi = match kind {
        Some("MultiPolygon") => multi_polygon(coordinates)?,
        Some("Polygon") => MultiPolygon::new(vec![polygon(coordinates)?]),
        Some(_) => return None,
        None => multi_polygon(coordinates)
            .or_else(|| polygon(coordinates).map(|p| MultiPolygon::new(vec![p])))?,
    };

    if multi.0.is_empty() { None } else { Some(multi) }
}

fn multi_polygon(coordinates: &Value) -> Option<MultiPolygon<f64>> {
    let polygons: Vec<geojson::PolygonType> = serde_json::from_value(coordinates.clone()).ok()?;
    polygons
        .iter()
        .map(|rings| polygon_from_rings(rings))
        .collect::<Option<Vec<_>>>()
        .map(MultiPolygon::new)
}

fn polygon(coordinates: &Value) -> Option<Polygon<f64>> {
    let rings: geojson::PolygonType = serde_json::from_value(coordinates.clone()).ok()?;
    polygon_from_rings(&rings)
}

fn polygon_from_rings(rings: &geojson::PolygonType) -> Option<Polygon<f64>> {
    let (exterior, interiors) = rings.split_first()?;
    let exterior = ring(exterior)?;
    let interiors = interiors.iter().map(|r| ring(r)).collect::<Option<Vec<_>>>()?;
    Some(Polygon::new(exterior, interiors))
}

/// A ring needs at least three positions of two finite ordinates each.
fn ring(positions: &[geojson::Position]) -> Option<LineString<f64>> {
    if positions.len() < 3 {
        return None;
    }
    positions
        .iter()
        .map(|p| match p.as_slice() {
            [x, y, ..] if x.is_finite() && y.is_finite() => Some((*x, *y)),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()
        .map(LineString::from)
}
