// 🌡️ Heatmap Matrix Builder
// Parameter-by-year percent-change grid with a capped symmetric color scale

use crate::align::parse_year;
use crate::format::format_percent;
use crate::model::{CategoryFilter, ComparisonDocument};
use serde::Serialize;
use std::collections::BTreeMap;

/// First projection year; earlier keys are historical actuals
pub const FIRST_PROJECTION_YEAR: i32 = 2024;

/// Lower bound of the color scale, keeps an all-zero grid from collapsing
pub const MIN_BOUND: f64 = 0.1;

/// Upper bound of the color scale, one outlier cannot wash out the grid
pub const MAX_BOUND: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeatmapCell {
    /// Percent change, zero when the parameter has no value for the year
    pub value: f64,
    /// Whether the value came from the document
    pub present: bool,
}

/// Render-ready heatmap
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapMatrix {
    pub row_keys: Vec<String>,
    pub row_labels: Vec<String>,
    pub years: Vec<String>,
    pub cells: Vec<Vec<HeatmapCell>>,
    pub zmin: f64,
    pub zmax: f64,
    /// Recommended chart height in pixels
    pub height: u32,
}

impl HeatmapMatrix {
    /// Plain numeric matrix (zero-filled)
    pub fn values(&self) -> Vec<Vec<f64>> {
        self.cells
            .iter()
            .map(|row| row.iter().map(|c| c.value).collect())
            .collect()
    }

    pub fn bound(&self) -> f64 {
        self.zmax
    }

    pub fn hover_text(&self, row: usize, col: usize) -> Option<String> {
        let label = self.row_labels.get(row)?;
        let year = self.years.get(col)?;
        let cell = self.cells.get(row)?.get(col)?;
        Some(format!(
            "{} · Year: {} · Change: {}",
            label,
            year,
            format_percent(cell.value)
        ))
    }
}

/// Build the heatmap for a category filter.
///
/// Returns None ("no chart") when no parameter passes the filter or when the
/// passing parameters have no percent-change values in projection years.
pub fn build(doc: &ComparisonDocument, filter: CategoryFilter) -> Option<HeatmapMatrix> {
    let rows: Vec<(&str, &crate::model::Parameter)> = doc.filtered(filter).collect();
    if rows.is_empty() {
        tracing::debug!(%filter, "heatmap: no parameters match filter");
        return None;
    }

    // numeric year -> original key
    let mut year_keys: BTreeMap<i32, String> = BTreeMap::new();
    for (_, param) in &rows {
        for key in param.pct_change.keys() {
            if let Some(year) = parse_year(key) {
                if year >= FIRST_PROJECTION_YEAR {
                    year_keys.entry(year).or_insert_with(|| key.to_string());
                }
            }
        }
    }
    if year_keys.is_empty() {
        tracing::debug!(%filter, "heatmap: no projection years");
        return None;
    }
    let years: Vec<String> = year_keys.into_values().collect();

    let cells: Vec<Vec<HeatmapCell>> = rows
        .iter()
        .map(|(_, param)| {
            years
                .iter()
                .map(|year| match param.pct_change.get(year) {
                    Some(value) => HeatmapCell {
                        value,
                        present: true,
                    },
                    None => HeatmapCell {
                        value: 0.0,
                        present: false,
                    },
                })
                .collect()
        })
        .collect();

    let raw_max = cells
        .iter()
        .flatten()
        .map(|c| c.value.abs())
        .fold(MIN_BOUND, f64::max);
    let bound = raw_max.min(MAX_BOUND);

    Some(HeatmapMatrix {
        row_keys: rows.iter().map(|(key, _)| key.to_string()).collect(),
        row_labels: rows.iter().map(|(_, param)| param.label.clone()).collect(),
        years,
        cells,
        zmin: -bound,
        zmax: bound,
        height: recommended_height(rows.len()),
    })
}

/// `max(400, rows * 40 + 150)`
pub fn recommended_height(rows: usize) -> u32 {
    let rows = u32::try_from(rows).unwrap_or(u32::MAX / 40);
    rows.saturating_mul(40).saturating_add(150).max(400)
}

// ============================================================================
// COLOR SCALE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub const NEGATIVE: Rgb = Rgb(0xDC, 0x26, 0x26);
pub const NEUTRAL: Rgb = Rgb(0xFF, 0xFF, 0xFF);
pub const POSITIVE: Rgb = Rgb(0x22, 0xC5, 0x5E);

/// Diverging color: -bound → red, 0 → white, +bound → green
pub fn cell_color(value: f64, bound: f64) -> Rgb {
    if bound <= 0.0 || !value.is_finite() {
        return NEUTRAL;
    }
    let t = (value / bound).clamp(-1.0, 1.0);
    if t < 0.0 {
        lerp(NEUTRAL, NEGATIVE, -t)
    } else {
        lerp(NEUTRAL, POSITIVE, t)
    }
}

fn lerp(from: Rgb, to: Rgb, t: f64) -> Rgb {
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    Rgb(mix(from.0, to.0), mix(from.1, to.1), mix(from.2, to.2))
}
