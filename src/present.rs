//! Turns aggregated regions into what the map widget consumes: a GeoJSON
//! feature collection with fill colors and popup markup, a legend, and the
//! bounds to fit the view to.

use anyhow::Result;
use geo::{BoundingRect, MultiPolygon, Rect, coord};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue};

use crate::analyzers::color::{ColorScale, Fill, LegendEntry};
use crate::analyzers::types::{RegionSummary, ScoreExtreme};
use crate::analyzers::utility::format_score;
use crate::config::{AppConfig, RegionKind};
use crate::regions::{Region, RegionId};
use crate::stats::LoadStats;

#[derive(Debug, Clone)]
pub struct RenderedRegion {
    pub id: RegionId,
    pub name: String,
    pub geometry: MultiPolygon<f64>,
    pub summary: RegionSummary,
    pub fill: Fill,
    pub fill_color: String,
    pub popup: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Legend {
    pub title: String,
    pub subtitle: String,
    pub entries: Vec<LegendEntry>,
}

impl Legend {
    /// Static markup for the legend overlay.
    pub fn to_html(&self) -> String {
        let mut html = format!(
            "<h4 style=\"text-align: center;\">{}<br><span style=\"font-size: 14px; font-weight: bold;\">{}</span></h4>",
            self.title,
            escape_html(&self.subtitle)
        );
        for entry in &self.entries {
            html.push_str(&format!(
                "<i style=\"background:{}\"></i> {}<br>",
                entry.color,
                escape_html(&entry.label)
            ));
        }
        html
    }
}

/// The finished choropleth for one load.
#[derive(Debug, Clone)]
pub struct ChoroplethMap {
    pub kind: RegionKind,
    pub regions: Vec<RenderedRegion>,
    pub legend: Legend,
    pub bounds: Option<Rect<f64>>,
    pub stats: LoadStats,
}

impl ChoroplethMap {
    pub fn feature_collection(&self) -> FeatureCollection {
        let features = self.regions.iter().map(region_feature).collect();
        FeatureCollection {
            bbox: self
                .bounds
                .map(|b| vec![b.min().x, b.min().y, b.max().x, b.max().y]),
            features,
            foreign_members: None,
        }
    }

    /// Fill assignment per region, in region order.
    pub fn fills(&self) -> Vec<(RegionId, Fill)> {
        self.regions.iter().map(|r| (r.id, r.fill)).collect()
    }

    pub fn averages(&self) -> Vec<(RegionId, Option<f64>)> {
        self.regions.iter().map(|r| (r.id, r.summary.average)).collect()
    }
}

/// Colors each region, writes its popup, and builds the legend.
///
/// `summaries` is positioned by [`RegionId`], as produced by
/// [`crate::analyzers::aggregate::aggregate_regions`].
pub fn present(
    config: &AppConfig,
    regions: Vec<Region>,
    summaries: Vec<RegionSummary>,
    stats: LoadStats,
) -> Result<ChoroplethMap> {
    let averages: Vec<f64> = summaries.iter().filter_map(|s| s.average).collect();
    let scale = ColorScale::build(&config.coloring, &averages)?;
    let kind = config.regions.kind;
    let bounds = bounds(&regions);

    let regions = regions
        .into_iter()
        .zip(summaries)
        .map(|(region, summary)| {
            let fill = scale.assign(summary.average);
            RenderedRegion {
                popup: popup_text(kind, &region.name, &summary, config.presentation.detailed_popup),
                fill_color: scale.color(fill).to_string(),
                fill,
                id: region.id,
                name: region.name,
                geometry: region.geometry,
                summary,
            }
        })
        .collect();

    Ok(ChoroplethMap {
        kind,
        regions,
        legend: Legend {
            title: config.presentation.title.clone(),
            subtitle: kind.legend_subtitle().to_string(),
            entries: scale.legend_entries(),
        },
        bounds,
        stats,
    })
}

/// Popup markup shown when a region is clicked.
pub fn popup_text(kind: RegionKind, name: &str, summary: &RegionSummary, detailed: bool) -> String {
    let mut text = format!("{}: {}<br>", kind.label(), escape_html(name));
    match summary.average {
        Some(average) => text.push_str(&format!("Average Inspection Score: {average:.0}")),
        None => text.push_str("No data"),
    }

    if detailed {
        text.push_str(&format!("<br>Business Count: {}", summary.business_count));
        text.push_str(&extreme_line("Highest", "highest-score", &summary.highest));
        text.push_str(&extreme_line("Lowest", "lowest-score", &summary.lowest));
    }
    text
}

fn extreme_line(label: &str, class: &str, extreme: &Option<ScoreExtreme>) -> String {
    let (score, business) = match extreme {
        Some(e) => (
            format_score(e.score),
            if e.business_name.is_empty() {
                "N/A".to_string()
            } else {
                escape_html(&e.business_name)
            },
        ),
        None => ("N/A".to_string(), "N/A".to_string()),
    };
    format!("<br>{label} Score: <span class='{class} score'>{score}</span> (Business: {business})")
}

/// Bounding box of all region geometries, for fitting the map view.
pub fn bounds(regions: &[Region]) -> Option<Rect<f64>> {
    regions
        .iter()
        .filter_map(|r| r.geometry.bounding_rect())
        .reduce(|a, b| {
            Rect::new(
                coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            )
        })
}

fn region_feature(region: &RenderedRegion) -> Feature {
    let summary = &region.summary;
    let mut properties = JsonObject::new();

    properties.insert("region_id".into(), JsonValue::from(region.id.0));
    properties.insert("name".into(), JsonValue::from(region.name.clone()));
    properties.insert(
        "average_inspection_score".into(),
        summary.average.map_or(JsonValue::Null, JsonValue::from),
    );
    properties.insert("business_count".into(), JsonValue::from(summary.business_count));
    properties.insert("businesses".into(), JsonValue::from(summary.businesses.clone()));
    for (prefix, extreme) in [("highest", &summary.highest), ("lowest", &summary.lowest)] {
        properties.insert(
            format!("{prefix}_score"),
            extreme.as_ref().map_or(JsonValue::Null, |e| JsonValue::from(e.score)),
        );
        properties.insert(
            format!("{prefix}_business"),
            extreme
                .as_ref()
                .map_or(JsonValue::Null, |e| JsonValue::from(e.business_name.clone())),
        );
    }
    properties.insert("fill_color".into(), JsonValue::from(region.fill_color.clone()));
    properties.insert("popup".into(), JsonValue::from(region.popup.clone()));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::from(&region.geometry))),
        id: Some(geojson::feature::Id::Number(region.id.0.into())),
        properties: Some(properties),
        foreign_members: None,
    }
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn region(id: usize, name: &str, x0: f64) -> Region {
        Region {
            id: RegionId(id),
            name: name.to_string(),
            geometry: MultiPolygon::new(vec![polygon![
                (x: x0, y: 0.0),
                (x: x0 + 1.0, y: 0.0),
                (x: x0 + 1.0, y: 1.0),
                (x: x0, y: 1.0),
            ]]),
        }
    }

    fn summary(average: Option<f64>) -> RegionSummary {
        RegionSummary {
            average,
            business_count: usize::from(average.is_some()),
            businesses: average.map(|_| "Top & Co".to_string()).into_iter().collect(),
            highest: average.map(|score| ScoreExtreme {
                score,
                business_name: "Top & Co".to_string(),
            }),
            lowest: average.map(|score| ScoreExtreme {
                score,
                business_name: String::new(),
            }),
        }
    }

    #[test]
    fn test_popup_with_score() {
        let text = popup_text(RegionKind::Neighborhood, "Mission", &summary(Some(80.0)), false);
        assert_eq!(text, "Neighborhood: Mission<br>Average Inspection Score: 80");
    }

    #[test]
    fn test_popup_without_data() {
        let text = popup_text(RegionKind::ZipCode, "94110", &summary(None), true);
        assert_eq!(
            text,
            "Zip Code: 94110<br>No data<br>Business Count: 0\
             <br>Highest Score: <span class='highest-score score'>N/A</span> (Business: N/A)\
             <br>Lowest Score: <span class='lowest-score score'>N/A</span> (Business: N/A)"
        );
    }

    #[test]
    fn test_popup_zero_score_is_not_no_data() {
        let text = popup_text(RegionKind::Neighborhood, "Presidio", &summary(Some(0.0)), false);
        assert!(text.ends_with("Average Inspection Score: 0"));
    }

    #[test]
    fn test_popup_escapes_names() {
        let text = popup_text(RegionKind::Neighborhood, "A<b>", &summary(Some(90.0)), true);
        assert!(text.starts_with("Neighborhood: A&lt;b&gt;<br>"));
        assert!(text.contains("(Business: Top &amp; Co)"));
        assert!(text.contains("<span class='lowest-score score'>90</span> (Business: N/A)"));
    }

    #[test]
    fn test_bounds_cover_all_regions() {
        let rect = bounds(&[region(0, "A", 0.0), region(1, "B", 3.0)]).unwrap();
        assert_eq!(rect.min(), coord! { x: 0.0, y: 0.0 });
        assert_eq!(rect.max(), coord! { x: 4.0, y: 1.0 });
        assert!(bounds(&[]).is_none());
    }

    #[test]
    fn test_present_colors_no_data_gray() {
        let config = AppConfig::zip_codes();
        let map = present(
            &config,
            vec![region(0, "94110", 0.0), region(1, "94103", 2.0)],
            vec![summary(Some(84.0)), summary(None)],
            LoadStats::default(),
        )
        .unwrap();

        assert_eq!(map.regions[0].fill_color, "#ff0000");
        assert_eq!(map.regions[1].fill, Fill::NoData);
        assert_eq!(map.regions[1].fill_color, "#808080");
        assert_eq!(map.legend.subtitle, "(by zip code)");
    }

    #[test]
    fn test_feature_properties() {
        let config = AppConfig::neighborhoods();
        let map = present(
            &config,
            vec![region(0, "Mission", 0.0), region(1, "Castro", 2.0)],
            vec![summary(Some(88.0)), summary(None)],
            LoadStats::default(),
        )
        .unwrap();

        let collection = map.feature_collection();
        assert_eq!(collection.features.len(), 2);
        assert_eq!(collection.bbox, Some(vec![0.0, 0.0, 3.0, 1.0]));

        let with_data = collection.features[0].properties.as_ref().unwrap();
        assert_eq!(with_data["name"], "Mission");
        assert_eq!(with_data["average_inspection_score"], 88.0);
        assert_eq!(with_data["highest_business"], "Top & Co");
        assert_eq!(with_data["businesses"], serde_json::json!(["Top & Co"]));

        let no_data = collection.features[1].properties.as_ref().unwrap();
        assert!(no_data["average_inspection_score"].is_null());
        assert!(no_data["lowest_score"].is_null());
        assert_eq!(no_data["businesses"], serde_json::json!([]));
        assert_eq!(no_data["fill_color"], "#808080");
    }

    #[test]
    fn test_legend_html() {
        let legend = Legend {
            title: "Scores".to_string(),
            subtitle: "(by neighborhood)".to_string(),
            entries: vec![LegendEntry {
                color: "#440154".to_string(),
                label: "65-70".to_string(),
            }],
        };
        let html = legend.to_html();
        assert!(html.contains("Scores<br>"));
        assert!(html.contains("<i style=\"background:#440154\"></i> 65-70<br>"));
    }
}
