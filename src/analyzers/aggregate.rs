use crate::analyzers::types::{RegionScoreIndex, RegionSummary, ScoreExtreme};
use crate::analyzers::utility::{mean, round_half_up};
use crate::inspections::InspectionRecord;

/// Reduces one region's attributed records to a [`RegionSummary`].
///
/// The average is rounded half up. Extremes keep the business of the first
/// record reaching them; later ties do not replace it.
pub fn summarize_region(records: &[&InspectionRecord]) -> RegionSummary {
    let scores: Vec<f64> = records.iter().map(|r| r.score).collect();

    let mut highest: Option<ScoreExtreme> = None;
    let mut lowest: Option<ScoreExtreme> = None;

    for record in records {
        if highest.as_ref().is_none_or(|h| record.score > h.score) {
            highest = Some(ScoreExtreme {
                score: record.score,
                business_name: record.business_name.clone(),
            });
        }
        if lowest.as_ref().is_none_or(|l| record.score < l.score) {
            lowest = Some(ScoreExtreme {
                score: record.score,
                business_name: record.business_name.clone(),
            });
        }
    }

    RegionSummary {
        average: mean(&scores).map(round_half_up),
        business_count: records.len(),
        businesses: records.iter().map(|r| r.business_name.clone()).collect(),
        highest,
        lowest,
    }
}

/// Summarizes every region in the index, in the order the regions were joined.
pub fn aggregate_regions(index: &RegionScoreIndex<'_>) -> Vec<RegionSummary> {
    index.iter().map(|(_, records)| summarize_region(records)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::join::containment_join;
    use crate::regions::{Region, RegionId};
    use geo::{MultiPolygon, Point, polygon};

    fn record(name: &str, score: f64) -> InspectionRecord {
        InspectionRecord {
            business_name: name.to_string(),
            location: None,
            score,
            postal_code: None,
        }
    }

    #[test]
    fn test_average_of_three() {
        let records = [record("a", 70.0), record("b", 80.0), record("c", 90.0)];
        let refs: Vec<_> = records.iter().collect();

        let summary = summarize_region(&refs);
        assert_eq!(summary.average, Some(80.0));
        assert_eq!(summary.business_count, 3);
        assert_eq!(summary.businesses, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_average_rounds_half_up() {
        let records = [record("a", 84.0), record("b", 85.0)];
        let refs: Vec<_> = records.iter().collect();
        assert_eq!(summarize_region(&refs).average, Some(85.0));

        let records = [record("a", 80.0), record("b", 80.0), record("c", 81.0)];
        let refs: Vec<_> = records.iter().collect();
        assert_eq!(summarize_region(&refs).average, Some(80.0));
    }

    #[test]
    fn test_empty_region_has_no_data() {
        let summary = summarize_region(&[]);
        assert_eq!(summary.average, None);
        assert!(!summary.has_data());
        assert_eq!(summary.business_count, 0);
        assert!(summary.highest.is_none());
        assert!(summary.lowest.is_none());
    }

    #[test]
    fn test_zero_score_is_data() {
        let records = [record("closed", 0.0)];
        let refs: Vec<_> = records.iter().collect();
        let summary = summarize_region(&refs);
        assert_eq!(summary.average, Some(0.0));
        assert!(summary.has_data());
    }

    #[test]
    fn test_extremes_first_occurrence_wins() {
        let records = [
            record("First Low", 70.0),
            record("First High", 95.0),
            record("Second Low", 70.0),
            record("Second High", 95.0),
            record("Middle", 85.0),
        ];
        let refs: Vec<_> = records.iter().collect();

        let summary = summarize_region(&refs);
        let lowest = summary.lowest.unwrap();
        let highest = summary.highest.unwrap();
        assert_eq!(lowest.business_name, "First Low");
        assert_eq!(lowest.score, 70.0);
        assert_eq!(highest.business_name, "First High");
        assert_eq!(highest.score, 95.0);
    }

    #[test]
    fn test_aggregate_regions_keeps_region_order() {
        let region = |id: usize, x0: f64| Region {
            id: RegionId(id),
            name: format!("R{id}"),
            geometry: MultiPolygon::new(vec![polygon![
                (x: x0, y: 0.0),
                (x: x0 + 1.0, y: 0.0),
                (x: x0 + 1.0, y: 1.0),
                (x: x0, y: 1.0),
            ]]),
        };
        let regions = vec![region(0, 0.0), region(1, 2.0)];
        let located = |score: f64| InspectionRecord {
            location: Some(Point::new(0.5, 0.5)),
            ..record("x", score)
        };
        let records = vec![located(70.0), located(80.0), located(90.0)];

        let outcome = containment_join(&regions, &records);
        let summaries = aggregate_regions(&outcome.index);

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].average, Some(80.0));
        assert_eq!(summaries[1].average, None);
    }
}
