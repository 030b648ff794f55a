//! Deployment configuration.
//!
//! One pipeline serves every map variant; the variant is chosen by an
//! [`AppConfig`], either loaded from TOML or taken from a built-in preset.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::analyzers::color::{ColorPolicy, ScaleSpec, ThresholdBucket, parse_color};
use crate::analyzers::join::JoinStrategy;
use crate::inspections::DuplicatePolicy;

pub const NEIGHBORHOODS_URL: &str = "https://data.sfgov.org/resource/6ia5-2f8k.json";
pub const ZIP_CODES_URL: &str = "https://data.sfgov.org/resource/srq6-hmpi.json";
pub const INSPECTIONS_URL: &str = "https://data.sfgov.org/resource/pyih-qa8i.json";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub sources: SourceConfig,
    pub regions: RegionConfig,
    #[serde(default)]
    pub inspections: InspectionConfig,
    pub coloring: ColoringConfig,
    #[serde(default)]
    pub presentation: PresentationConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where each dataset comes from: an `http(s)://` URL or a local file path.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub regions: String,
    pub inspections: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Neighborhood,
    ZipCode,
}

impl RegionKind {
    /// Label used in popups, e.g. `Neighborhood: Mission`.
    pub fn label(&self) -> &'static str {
        match self {
            RegionKind::Neighborhood => "Neighborhood",
            RegionKind::ZipCode => "Zip Code",
        }
    }

    pub fn legend_subtitle(&self) -> &'static str {
        match self {
            RegionKind::Neighborhood => "(by neighborhood)",
            RegionKind::ZipCode => "(by zip code)",
        }
    }

    /// Record fields tried, in order, for the region identifier.
    pub fn default_id_fields(&self) -> Vec<String> {
        let fields: &[&str] = match self {
            RegionKind::Neighborhood => &["name"],
            RegionKind::ZipCode => &["zip_code", "zip", "business_postal_code"],
        };
        fields.iter().map(|f| f.to_string()).collect()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegionConfig {
    pub kind: RegionKind,
    pub join: JoinStrategy,
    /// Overrides [`RegionKind::default_id_fields`].
    pub id_fields: Option<Vec<String>>,
}

impl RegionConfig {
    pub fn identifier_fields(&self) -> Vec<String> {
        self.id_fields
            .clone()
            .unwrap_or_else(|| self.kind.default_id_fields())
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct InspectionConfig {
    #[serde(default)]
    pub duplicates: DuplicatePolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ColoringConfig {
    #[serde(default = "default_no_data_color")]
    pub no_data_color: String,
    pub policy: ColorPolicy,
}

fn default_no_data_color() -> String {
    "#808080".to_string()
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PresentationConfig {
    pub title: String,
    pub center: [f64; 2],
    pub zoom: u8,
    pub tile_url: String,
    pub attribution: String,
    /// Adds business count and highest/lowest scores to popups.
    pub detailed_popup: bool,
    pub outline_color: String,
    pub outline_weight: f64,
    pub highlight_weight: f64,
    pub fill_opacity: f64,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            title: "City of San Francisco Public Health<br>Restaurant Sanitation Inspection Scores"
                .to_string(),
            center: [37.7749, -122.4194],
            zoom: 13,
            tile_url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            attribution: "&copy; <a href=\"https://www.openstreetmap.org/\">OpenStreetMap</a> contributors"
                .to_string(),
            detailed_popup: true,
            outline_color: "black".to_string(),
            outline_weight: 1.0,
            highlight_weight: 3.0,
            fill_opacity: 0.5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FetchConfig {
    /// Wait for the region dataset before requesting inspections.
    pub sequential: bool,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Neighborhood boundaries, containment join, quantile-binned viridis fill.
    pub fn neighborhoods() -> Self {
        Self {
            sources: SourceConfig {
                regions: NEIGHBORHOODS_URL.to_string(),
                inspections: INSPECTIONS_URL.to_string(),
            },
            regions: RegionConfig {
                kind: RegionKind::Neighborhood,
                join: JoinStrategy::Containment,
                id_fields: None,
            },
            inspections: InspectionConfig {
                duplicates: DuplicatePolicy::KeepAll,
            },
            coloring: ColoringConfig {
                no_data_color: default_no_data_color(),
                policy: ColorPolicy::Quantile {
                    steps: 4,
                    scale: ScaleSpec::Named("viridis".to_string()),
                    domain: None,
                },
            },
            presentation: PresentationConfig::default(),
            fetch: FetchConfig::default(),
            output: OutputConfig::default(),
        }
    }

    /// Zip-code boundaries, postal-code join, fixed score thresholds.
    pub fn zip_codes() -> Self {
        let bucket = |min: f64, color: &str| ThresholdBucket {
            min,
            color: color.to_string(),
            label: None,
        };

        Self {
            sources: SourceConfig {
                regions: ZIP_CODES_URL.to_string(),
                inspections: INSPECTIONS_URL.to_string(),
            },
            regions: RegionConfig {
                kind: RegionKind::ZipCode,
                join: JoinStrategy::PostalCode,
                id_fields: None,
            },
            inspections: InspectionConfig {
                duplicates: DuplicatePolicy::FirstPerBusiness,
            },
            coloring: ColoringConfig {
                no_data_color: default_no_data_color(),
                policy: ColorPolicy::Thresholds {
                    buckets: vec![
                        bucket(81.0, "#ff0000"),
                        bucket(85.0, "#ffff00"),
                        bucket(90.0, "#008000"),
                    ],
                    domain: Some([0.0, 100.0]),
                },
            },
            presentation: PresentationConfig {
                detailed_popup: false,
                ..PresentationConfig::default()
            },
            fetch: FetchConfig::default(),
            output: OutputConfig::default(),
        }
    }

    /// Rejects configurations the pipeline could only fail on later.
    pub fn validate(&self) -> Result<()> {
        if self.regions.identifier_fields().is_empty() {
            bail!("regions.id_fields must name at least one field");
        }
        parse_color(&self.coloring.no_data_color)
            .with_context(|| "Invalid coloring.no_data_color")?;
        self.coloring.policy.validate()?;

        let p = &self.presentation;
        if !(0.0..=1.0).contains(&p.fill_opacity) {
            bail!("presentation.fill_opacity must be within 0..=1");
        }
        if p.outline_weight <= 0.0 || p.highlight_weight <= 0.0 {
            bail!("presentation outline weights must be positive");
        }
        Ok(())
    }
}
