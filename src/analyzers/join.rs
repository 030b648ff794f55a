//! Attribution of inspection records to regions.

use geo::Contains;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::analyzers::types::{JoinOutcome, RegionScoreIndex};
use crate::inspections::InspectionRecord;
use crate::regions::Region;

/// How a record finds its region. Chosen per deployment, never inferred.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JoinStrategy {
    /// Point-in-polygon against every region in order; first match wins.
    Containment,
    /// Exact match of the record's postal code against region identifiers.
    PostalCode,
}

impl JoinStrategy {
    /// Whether `record` carries the field this strategy joins on.
    pub fn has_key(&self, record: &InspectionRecord) -> bool {
        match self {
            JoinStrategy::Containment => record.location.is_some(),
            JoinStrategy::PostalCode => record.postal_code.is_some(),
        }
    }
}

pub fn join<'a>(
    strategy: JoinStrategy,
    regions: &[Region],
    records: &'a [InspectionRecord],
) -> JoinOutcome<'a> {
    let outcome = match strategy {
        JoinStrategy::Containment => containment_join(regions, records),
        JoinStrategy::PostalCode => postal_code_join(regions, records),
    };

    info!(
        strategy = ?strategy,
        attributed = outcome.index.attributed(),
        unmatched = outcome.unmatched,
        missing_key = outcome.missing_key,
        "Inspection records joined to regions"
    );
    outcome
}

/// Attributes each located record to the first region containing it.
///
/// Nested loop over records and regions; points on a boundary are not
/// contained by any region and stay unattributed.
pub fn containment_join<'a>(regions: &[Region], records: &'a [InspectionRecord]) -> JoinOutcome<'a> {
    let mut outcome = JoinOutcome {
        index: RegionScoreIndex::new(regions),
        unmatched: 0,
        missing_key: 0,
    };

    for record in records {
        let Some(point) = record.location else {
            outcome.missing_key += 1;
            continue;
        };

        match regions.iter().position(|r| r.geometry.contains(&point)) {
            Some(position) => outcome.index.attribute(position, record),
            None => {
                debug!(business = %record.business_name, x = point.x(), y = point.y(), "No region contains record");
                outcome.unmatched += 1;
            }
        }
    }

    outcome
}

/// Attributes each record whose postal code names a region.
///
/// When two regions share an identifier the first one keeps it.
pub fn postal_code_join<'a>(regions: &[Region], records: &'a [InspectionRecord]) -> JoinOutcome<'a> {
    let mut by_code: HashMap<&str, usize> = HashMap::with_capacity(regions.len());
    for (position, region) in regions.iter().enumerate() {
        by_code.entry(region.name.as_str()).or_insert(position);
    }

    let mut outcome = JoinOutcome {
        index: RegionScoreIndex::new(regions),
        unmatched: 0,
        missing_key: 0,
    };

    for record in records {
        let Some(code) = record.postal_code.as_deref() else {
            outcome.missing_key += 1;
            continue;
        };

        match by_code.get(code.trim()) {
            Some(&position) => outcome.index.attribute(position, record),
            None => {
                debug!(business = %record.business_name, postal_code = code, "No region for postal code");
                outcome.unmatched += 1;
            }
        }
    }

    outcome
}
