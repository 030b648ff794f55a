//! Data types shared by the join and aggregation steps.

use serde::Serialize;

use crate::inspections::InspectionRecord;
use crate::regions::{Region, RegionId};

/// Records attributed to each region, in input order.
///
/// Built by the joiner and consumed by the aggregator. Slots follow the
/// order of the region slice the index was built from, whatever ids those
/// regions carry. A record is pushed into at most one region's list.
#[derive(Debug)]
pub struct RegionScoreIndex<'a> {
    ids: Vec<RegionId>,
    entries: Vec<Vec<&'a InspectionRecord>>,
}

impl<'a> RegionScoreIndex<'a> {
    pub fn new(regions: &[Region]) -> Self {
        Self {
            ids: regions.iter().map(|r| r.id).collect(),
            entries: vec![Vec::new(); regions.len()],
        }
    }

    /// Attributes `record` to the region at `position` in the source slice.
    pub(crate) fn attribute(&mut self, position: usize, record: &'a InspectionRecord) {
        if let Some(entry) = self.entries.get_mut(position) {
            entry.push(record);
        }
    }

    /// Records attributed to `region`; empty for unknown ids.
    pub fn records(&self, region: RegionId) -> &[&'a InspectionRecord] {
        self.ids
            .iter()
            .position(|id| *id == region)
            .and_then(|i| self.entries.get(i))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn scores(&self, region: RegionId) -> Vec<f64> {
        self.records(region).iter().map(|r| r.score).collect()
    }

    /// Regions in source order with their attributed records.
    pub fn iter(&self) -> impl Iterator<Item = (RegionId, &[&'a InspectionRecord])> {
        self.ids
            .iter()
            .copied()
            .zip(self.entries.iter().map(Vec::as_slice))
    }

    /// Total records attributed across all regions.
    pub fn attributed(&self) -> usize {
        self.entries.iter().map(Vec::len).sum()
    }
}

/// Result of attributing inspection records to regions.
#[derive(Debug)]
pub struct JoinOutcome<'a> {
    pub index: RegionScoreIndex<'a>,
    /// Records carrying the join key but matching no region.
    pub unmatched: usize,
    /// Records lacking the field the join strategy needs.
    pub missing_key: usize,
}

/// The first business to reach a region's highest or lowest score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreExtreme {
    pub score: f64,
    pub business_name: String,
}

/// Derived statistics for one region.
///
/// `average` is `None` when no record was attributed; that state is kept
/// distinct from a zero score all the way to the rendered fill.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RegionSummary {
    pub average: Option<f64>,
    pub business_count: usize,
    /// Business names of the attributed records, in input order.
    pub businesses: Vec<String>,
    pub highest: Option<ScoreExtreme>,
    pub lowest: Option<ScoreExtreme>,
}

impl RegionSummary {
    pub fn has_data(&self) -> bool {
        self.average.is_some()
    }
}
