use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

use crate::analyzers::types::{JoinOutcome, RegionSummary};
use crate::inspections::ParsedInspections;

/// Bookkeeping for one pipeline run: what was fetched, kept and matched.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct LoadStats {
    pub generated_at: DateTime<Utc>,

    // regions
    pub regions: usize,
    pub regions_with_data: usize,

    // inspection records
    pub inspections_fetched: usize,
    pub inspections_kept: usize,
    pub missing_score: usize,
    pub invalid_score: usize,
    pub missing_location: usize,
    pub duplicates: usize,

    // join
    pub attributed: usize,
    pub unmatched: usize,
    pub missing_key: usize,
    pub unique_businesses: usize,
}

impl LoadStats {
    pub fn from_load(
        inspections: &ParsedInspections,
        outcome: &JoinOutcome<'_>,
        summaries: &[RegionSummary],
    ) -> Self {
        let unique_businesses = outcome
            .index
            .iter()
            .flat_map(|(_, records)| records.iter().map(|r| r.business_name.as_str()))
            .collect::<HashSet<_>>()
            .len();

        LoadStats {
            generated_at: Utc::now(),
            regions: summaries.len(),
            regions_with_data: summaries.iter().filter(|s| s.has_data()).count(),
            inspections_fetched: inspections.fetched,
            inspections_kept: inspections.records.len(),
            missing_score: inspections.missing_score,
            invalid_score: inspections.invalid_score,
            missing_location: inspections.missing_location,
            duplicates: inspections.duplicates,
            attributed: outcome.index.attributed(),
            unmatched: outcome.unmatched,
            missing_key: outcome.missing_key,
            unique_businesses,
        }
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    /// Share of kept inspection records that landed in a region.
    pub fn attributed_pct(&self) -> f64 {
        Self::pct(self.attributed, self.inspections_kept)
    }

    pub fn coverage_pct(&self) -> f64 {
        Self::pct(self.regions_with_data, self.regions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::aggregate::aggregate_regions;
    use crate::analyzers::join::postal_code_join;
    use crate::inspections::InspectionRecord;
    use crate::regions::{Region, RegionId};
    use geo::MultiPolygon;

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(LoadStats::pct(10, 0), 0.0);
    }

    #[test]
    fn test_pct_normal_values() {
        assert_eq!(LoadStats::pct(50, 100), 50.0);
        assert_eq!(LoadStats::pct(1, 4), 25.0);
    }

    #[test]
    fn test_from_load_counts() {
        let regions: Vec<Region> = ["94110", "94103"]
            .iter()
            .enumerate()
            .map(|(i, code)| Region {
                id: RegionId(i),
                name: code.to_string(),
                geometry: MultiPolygon::new(vec![]),
            })
            .collect();

        let record = |name: &str, code: &str| InspectionRecord {
            business_name: name.to_string(),
            location: None,
            score: 90.0,
            postal_code: Some(code.to_string()),
        };
        let inspections = ParsedInspections {
            records: vec![
                record("Deli", "94110"),
                record("Deli", "94110"),
                record("Cafe", "94110"),
                record("Bar", "00000"),
            ],
            fetched: 6,
            missing_score: 1,
            invalid_score: 1,
            ..Default::default()
        };

        let outcome = postal_code_join(&regions, &inspections.records);
        let summaries = aggregate_regions(&outcome.index);
        let stats = LoadStats::from_load(&inspections, &outcome, &summaries);

        assert_eq!(stats.regions, 2);
        assert_eq!(stats.regions_with_data, 1);
        assert_eq!(stats.inspections_fetched, 6);
        assert_eq!(stats.inspections_kept, 4);
        assert_eq!(stats.attributed, 3);
        assert_eq!(stats.unmatched, 1);
        assert_eq!(stats.unique_businesses, 2);
        assert_eq!(stats.attributed_pct(), 75.0);
        assert_eq!(stats.coverage_pct(), 50.0);
    }
}
