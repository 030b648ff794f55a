//! Inspection loader: point-located restaurant inspection scores.

use anyhow::{Context, Result};
use geo::Point;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::analyzers::join::JoinStrategy;
use crate::fetch::{HttpClient, load_source};
use crate::regions::identifier;

#[derive(Debug, Clone, PartialEq)]
pub struct InspectionRecord {
    pub business_name: String,
    /// `(longitude, latitude)`.
    pub location: Option<Point<f64>>,
    pub score: f64,
    pub postal_code: Option<String>,
}

/// How repeat inspections of the same business feed the averages.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Every inspection contributes its score.
    #[default]
    KeepAll,
    /// Only the first inspection per business name that carries the join
    /// key contributes. Records without the key never claim the slot.
    FirstPerBusiness,
}

/// Parsed records plus the reasons the rest were dropped.
#[derive(Debug, Default)]
pub struct ParsedInspections {
    pub records: Vec<InspectionRecord>,
    pub fetched: usize,
    pub missing_score: usize,
    pub invalid_score: usize,
    pub missing_location: usize,
    pub duplicates: usize,
}

#[tracing::instrument(skip(client), fields(source = %source))]
pub async fn load_inspections<C: HttpClient>(
    client: &C,
    source: &str,
    policy: DuplicatePolicy,
    strategy: JoinStrategy,
) -> Result<ParsedInspections> {
    let bytes = load_source(client, source)
        .await
        .context("Failed to load inspection records")?;
    let parsed = parse_inspections(&bytes, policy, strategy)?;
    info!(
        fetched = parsed.fetched,
        kept = parsed.records.len(),
        missing_score = parsed.missing_score,
        invalid_score = parsed.invalid_score,
        missing_location = parsed.missing_location,
        duplicates = parsed.duplicates,
        "Inspection records loaded"
    );
    Ok(parsed)
}

/// Parses a JSON array of inspection records.
///
/// A record is kept when its `inspection_score` parses to a finite number and
/// it carries a coordinate or a postal code. Everything else is counted and
/// skipped rather than reported as an error. `strategy` decides which
/// records take part in duplicate detection.
///
/// # Errors
///
/// Returns an error if `bytes` is not a JSON array.
pub fn parse_inspections(
    bytes: &[u8],
    policy: DuplicatePolicy,
    strategy: JoinStrategy,
) -> Result<ParsedInspections> {
    let items: Vec<Value> =
        serde_json::from_slice(bytes).context("Inspection data is not a JSON array")?;

    let mut parsed = ParsedInspections {
        fetched: items.len(),
        ..Default::default()
    };
    let mut seen = HashSet::new();

    for item in &items {
        let score = match &item["inspection_score"] {
            Value::Null => {
                parsed.missing_score += 1;
                continue;
            }
            raw => match parse_score(raw) {
                Some(score) => score,
                None => {
                    debug!(raw = %raw, "Unparseable inspection score");
                    parsed.invalid_score += 1;
                    continue;
                }
            },
        };

        let location = parse_location(&item["business_location"]);
        let postal_code = identifier(&item["business_postal_code"]);
        if location.is_none() && postal_code.is_none() {
            parsed.missing_location += 1;
            continue;
        }

        let business_name = item["business_name"]
            .as_str()
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        let record = InspectionRecord {
            business_name,
            location,
            score,
            postal_code,
        };

        if policy == DuplicatePolicy::FirstPerBusiness
            && !record.business_name.is_empty()
            && strategy.has_key(&record)
            && !seen.insert(record.business_name.clone())
        {
            parsed.duplicates += 1;
            continue;
        }

        parsed.records.push(record);
    }

    Ok(parsed)
}

/// Accepts scores published as text (`"92"`) or as numbers.
pub fn parse_score(value: &Value) -> Option<f64> {
    let score = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    score.is_finite().then_some(score)
}

fn parse_location(value: &Value) -> Option<Point<f64>> {
    match value["coordinates"].as_array()?.as_slice() {
        [lon, lat, ..] => {
            let (lon, lat) = (lon.as_f64()?, lat.as_f64()?);
            (lon.is_finite() && lat.is_finite()).then(|| Point::new(lon, lat))
        }
        _ => None,
    }
}
