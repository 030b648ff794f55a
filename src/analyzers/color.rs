//! Maps region averages onto fill colors.
//!
//! Two policies are supported:
//!
//! | Policy       | Bins                                              |
//! |--------------|---------------------------------------------------|
//! | `quantile`   | limits taken from the data, colors from a scale   |
//! | `thresholds` | fixed inclusive lower bounds, one color per bound |
//!
//! Regions without data, below the lowest threshold, or outside the
//! configured domain are always drawn in the no-data color.

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::analyzers::utility::format_score;
use crate::config::ColoringConfig;

/// Viridis stops used by the neighborhood map.
const VIRIDIS: &[&str] = &["#440154", "#31688e", "#ffff00"];

const NAMED_COLORS: &[(&str, &str)] = &[
    ("black", "#000000"),
    ("white", "#ffffff"),
    ("gray", "#808080"),
    ("grey", "#808080"),
    ("red", "#ff0000"),
    ("green", "#008000"),
    ("yellow", "#ffff00"),
    ("orange", "#ffa500"),
    ("blue", "#0000ff"),
];

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ColorPolicy {
    Quantile {
        steps: usize,
        scale: ScaleSpec,
        #[serde(default)]
        domain: Option<[f64; 2]>,
    },
    Thresholds {
        buckets: Vec<ThresholdBucket>,
        #[serde(default)]
        domain: Option<[f64; 2]>,
    },
}

/// A named scale (`"viridis"`) or explicit color stops.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum ScaleSpec {
    Named(String),
    Colors(Vec<String>),
}

#[derive(Debug, Deserialize, Clone)]
pub struct ThresholdBucket {
    /// Inclusive lower bound.
    pub min: f64,
    pub color: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let channel = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb(
            channel(self.0, other.0),
            channel(self.1, other.1),
            channel(self.2, other.2),
        )
    }
}

/// Parses `#rgb`, `#rrggbb` or a basic CSS color name.
pub fn parse_color(color: &str) -> Result<Rgb> {
    let color = color.trim().to_ascii_lowercase();
    let hex = match NAMED_COLORS.iter().find(|(name, _)| *name == color) {
        Some((_, hex)) => &hex[1..],
        None => color
            .strip_prefix('#')
            .ok_or_else(|| anyhow!("Unsupported color '{color}'"))?,
    };

    let digits: Vec<u8> = hex
        .chars()
        .map(|c| c.to_digit(16).map(|d| d as u8))
        .collect::<Option<_>>()
        .ok_or_else(|| anyhow!("Invalid hex color '#{hex}'"))?;

    match digits.as_slice() {
        [r, g, b] => Ok(Rgb(r * 17, g * 17, b * 17)),
        [r1, r2, g1, g2, b1, b2] => Ok(Rgb(r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2)),
        _ => bail!("Invalid hex color '#{hex}'"),
    }
}

/// Evenly samples `count` colors along the stops, interpolating in RGB.
pub fn scale_colors(stops: &[Rgb], count: usize) -> Vec<Rgb> {
    match stops {
        [] => Vec::new(),
        [only] => vec![*only; count],
        _ => (0..count)
            .map(|i| {
                let t = if count > 1 { i as f64 / (count - 1) as f64 } else { 0.0 };
                let pos = t * (stops.len() - 1) as f64;
                let segment = (pos.floor() as usize).min(stops.len() - 2);
                stops[segment].lerp(stops[segment + 1], pos - segment as f64)
            })
            .collect(),
    }
}

/// Limits splitting `values` into `steps` quantile bins.
///
/// Returns `steps` limits (two when `steps` is 1): the minimum, the
/// interpolated inner quantiles, and the maximum. A value belongs to the
/// first bin whose limit it does not exceed, so the first bin holds only
/// the minimum.
pub fn quantile_limits(values: &[f64], steps: usize) -> Vec<f64> {
    if values.is_empty() || steps == 0 {
        return Vec::new();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let last = sorted.len() - 1;

    let num = steps.saturating_sub(1).max(1);
    let mut limits = Vec::with_capacity(num + 1);
    limits.push(sorted[0]);
    for i in 1..num {
        let p = (last * i) as f64 / num as f64;
        let below = p.floor() as usize;
        let fraction = p - below as f64;
        if fraction == 0.0 {
            limits.push(sorted[below]);
        } else {
            limits.push(sorted[below] * (1.0 - fraction) + sorted[below + 1] * fraction);
        }
    }
    limits.push(sorted[last]);
    limits
}

fn resolve_scale(scale: &ScaleSpec) -> Result<Vec<Rgb>> {
    let stops: Vec<&str> = match scale {
        ScaleSpec::Named(name) if name.eq_ignore_ascii_case("viridis") => VIRIDIS.to_vec(),
        ScaleSpec::Named(name) => bail!("Unknown color scale '{name}'"),
        ScaleSpec::Colors(colors) => colors.iter().map(String::as_str).collect(),
    };
    if stops.is_empty() {
        bail!("Color scale has no stops");
    }
    stops.into_iter().map(parse_color).collect()
}

fn check_domain(domain: &Option<[f64; 2]>) -> Result<()> {
    if let Some([lo, hi]) = domain {
        if !(lo.is_finite() && hi.is_finite() && lo <= hi) {
            bail!("Color domain [{lo}, {hi}] is not an ordered finite range");
        }
    }
    Ok(())
}

impl ColorPolicy {
    pub fn validate(&self) -> Result<()> {
        match self {
            ColorPolicy::Quantile { steps, scale, domain } => {
                if *steps == 0 {
                    bail!("Quantile coloring needs at least one step");
                }
                resolve_scale(scale)?;
                check_domain(domain)
            }
            ColorPolicy::Thresholds { buckets, domain } => {
                if buckets.is_empty() {
                    bail!("Threshold coloring needs at least one bucket");
                }
                if buckets.windows(2).any(|w| w[0].min >= w[1].min) {
                    bail!("Threshold buckets must have strictly increasing lower bounds");
                }
                for bucket in buckets {
                    parse_color(&bucket.color)?;
                }
                check_domain(domain)
            }
        }
    }
}

/// Where a region's value landed on the scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fill {
    Bucket(usize),
    OutOfRange,
    NoData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    pub color: String,
    pub label: String,
    /// Quantile: inclusive upper limit. Thresholds: inclusive lower bound.
    pub bound: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub color: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinMode {
    UpperLimits,
    LowerBounds,
}

/// A color policy resolved against the data of one load.
#[derive(Debug, Clone)]
pub struct ColorScale {
    bins: Vec<Bin>,
    mode: BinMode,
    domain: Option<[f64; 2]>,
    no_data_color: String,
}

impl ColorScale {
    /// Resolves `config` against the region averages of this load.
    ///
    /// Quantile limits are computed from the values inside the domain only.
    pub fn build(config: &ColoringConfig, values: &[f64]) -> Result<Self> {
        config.policy.validate()?;
        let no_data_color = parse_color(&config.no_data_color)?.to_hex();

        let scale = match &config.policy {
            ColorPolicy::Quantile { steps, scale, domain } => {
                let in_domain: Vec<f64> = values
                    .iter()
                    .copied()
                    .filter(|v| within(*domain, *v))
                    .collect();
                let limits = quantile_limits(&in_domain, *steps);
                let colors = scale_colors(&resolve_scale(scale)?, limits.len());

                let bins = limits
                    .iter()
                    .zip(colors)
                    .enumerate()
                    .map(|(i, (&limit, color))| Bin {
                        color: color.to_hex(),
                        label: if i == 0 {
                            format_score(limit)
                        } else {
                            format!("{}-{}", format_score(limits[i - 1]), format_score(limit))
                        },
                        bound: limit,
                    })
                    .collect();

                ColorScale {
                    bins,
                    mode: BinMode::UpperLimits,
                    domain: *domain,
                    no_data_color,
                }
            }
            ColorPolicy::Thresholds { buckets, domain } => {
                let bins = buckets
                    .iter()
                    .enumerate()
                    .map(|(i, bucket)| -> Result<Bin> {
                        Ok(Bin {
                            color: parse_color(&bucket.color)?.to_hex(),
                            label: bucket
                                .label
                                .clone()
                                .unwrap_or_else(|| threshold_label(bucket.min, buckets.get(i + 1))),
                            bound: bucket.min,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;

                ColorScale {
                    bins,
                    mode: BinMode::LowerBounds,
                    domain: *domain,
                    no_data_color,
                }
            }
        };

        Ok(scale)
    }

    pub fn assign(&self, value: Option<f64>) -> Fill {
        let Some(value) = value else {
            return Fill::NoData;
        };
        if !within(self.domain, value) {
            return Fill::OutOfRange;
        }

        let bucket = match self.mode {
            BinMode::UpperLimits => self.bins.iter().position(|b| value <= b.bound),
            BinMode::LowerBounds => self.bins.iter().rposition(|b| value >= b.bound),
        };
        bucket.map_or(Fill::OutOfRange, Fill::Bucket)
    }

    pub fn color(&self, fill: Fill) -> &str {
        match fill {
            Fill::Bucket(i) => self
                .bins
                .get(i)
                .map_or(self.no_data_color.as_str(), |b| b.color.as_str()),
            Fill::OutOfRange | Fill::NoData => &self.no_data_color,
        }
    }

    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    /// Legend swatches: one per bin, then the gray catch-all entries.
    pub fn legend_entries(&self) -> Vec<LegendEntry> {
        let mut entries: Vec<LegendEntry> = self
            .bins
            .iter()
            .map(|b| LegendEntry {
                color: b.color.clone(),
                label: b.label.clone(),
            })
            .collect();

        if self.mode == BinMode::LowerBounds {
            if let Some(first) = self.bins.first() {
                entries.insert(
                    0,
                    LegendEntry {
                        color: self.no_data_color.clone(),
                        label: format!("< {}", format_score(first.bound)),
                    },
                );
            }
        }
        if let Some([lo, hi]) = self.domain {
            entries.push(LegendEntry {
                color: self.no_data_color.clone(),
                label: format!("Outside {}-{}", format_score(lo), format_score(hi)),
            });
        }
        entries.push(LegendEntry {
            color: self.no_data_color.clone(),
            label: "No data".to_string(),
        });
        entries
    }
}

fn within(domain: Option<[f64; 2]>, value: f64) -> bool {
    domain.is_none_or(|[lo, hi]| (lo..=hi).contains(&value))
}

fn threshold_label(min: f64, next: Option<&ThresholdBucket>) -> String {
    match next {
        Some(next) if min.fract() == 0.0 && next.min.fract() == 0.0 => {
            format!("{}-{}", format_score(min), format_score(next.min - 1.0))
        }
        Some(next) => format!("{} to <{}", format_score(min), format_score(next.min)),
        None => format!("{}+", format_score(min)),
    }
}
