// 〰️ Sparkline Normalizer
// Min-max scaling of an old/new pair into one shared drawing frame

use crate::align;
use crate::model::Parameter;
use serde::Serialize;

/// Drawing frame in abstract units (pixels for SVG, cells for the TUI)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Frame {
    pub width: f64,
    pub height: f64,
    /// Vertical padding above the max and below the min
    pub pad: f64,
}

impl Default for Frame {
    fn default() -> Self {
        Frame {
            width: 120.0,
            height: 32.0,
            pad: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Two independent polylines in one coordinate frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sparkline {
    pub old: Vec<Point>,
    pub new: Vec<Point>,
    pub min: f64,
    pub max: f64,
    pub frame: Frame,
}

/// Normalize two sequences. Returns None when neither holds a value.
pub fn normalize(old: &[Option<f64>], new: &[Option<f64>], frame: Frame) -> Option<Sparkline> {
    let pool: Vec<f64> = old.iter().chain(new.iter()).flatten().copied().collect();
    if pool.is_empty() {
        return None;
    }

    let min = pool.iter().copied().fold(f64::INFINITY, f64::min);
    let max = pool.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    // Constant series would otherwise divide by zero
    let range = (max - min).max(1.0);

    let project = |values: &[Option<f64>]| -> Vec<Point> {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        let n = present.len();
        present
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let x = if n > 1 {
                    i as f64 / (n - 1) as f64 * frame.width
                } else {
                    frame.width / 2.0
                };
                let y = frame.height - frame.pad - ((v - min) / range) * (frame.height - 2.0 * frame.pad);
                Point { x, y }
            })
            .collect()
    };

    Some(Sparkline {
        old: project(old),
        new: project(new),
        min,
        max,
        frame,
    })
}

/// Old/new sequences of a parameter laid over the union of its years
pub fn series_over_years(param: &Parameter) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let years = align::align(&param.old, &param.new).years;
    let old = years.iter().map(|y| param.old.get(y)).collect();
    let new = years.iter().map(|y| param.new.get(y)).collect();
    (old, new)
}

/// Sparkline for a parameter card
pub fn for_parameter(param: &Parameter, frame: Frame) -> Option<Sparkline> {
    let (old, new) = series_over_years(param);
    normalize(&old, &new, frame)
}

const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Render one polyline as block glyphs, one char per point.
///
/// The drawable band is `[pad, height - pad]`; y is inverted so the top of the
/// band maps to the tallest block.
pub fn to_glyphs(points: &[Point], frame: Frame) -> String {
    let band = (frame.height - 2.0 * frame.pad).max(f64::EPSILON);
    points
        .iter()
        .map(|p| {
            let level = ((frame.height - frame.pad - p.y) / band).clamp(0.0, 1.0);
            let idx = (level * (LEVELS.len() - 1) as f64).round() as usize;
            LEVELS[idx.min(LEVELS.len() - 1)]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Unit, YearSeries};

    fn frame() -> Frame {
        Frame::default()
    }

    #[test]
    fn test_constant_series_is_flat() {
        let values = vec![Some(5.0), Some(5.0), Some(5.0)];
        let spark = normalize(&values, &[], frame()).unwrap();

        assert_eq!(spark.old.len(), 3);
        let y0 = spark.old[0].y;
        assert!(spark.old.iter().all(|p| p.y == y0));
        assert!(y0.is_finite());
        // min maps to the bottom of the band
        assert_eq!(y0, 30.0);
    }

    #[test]
    fn test_empty_pool_draws_nothing() {
        assert!(normalize(&[], &[], frame()).is_none());
        assert!(normalize(&[None, None], &[None], frame()).is_none());
    }

    #[test]
    fn test_shared_frame_and_inverted_y() {
        let old = vec![Some(0.0), Some(10.0)];
        let new = vec![Some(20.0)];
        let spark = normalize(&old, &new, frame()).unwrap();

        assert_eq!(spark.min, 0.0);
        assert_eq!(spark.max, 20.0);
        // Old: first point at x=0, last at x=width
        assert_eq!(spark.old[0].x, 0.0);
        assert_eq!(spark.old[1].x, 120.0);
        assert_eq!(spark.old[0].y, 30.0);
        assert_eq!(spark.old[1].y, 16.0);
        // Single new point is centered and sits at the top of the band
        assert_eq!(spark.new[0].x, 60.0);
        assert_eq!(spark.new[0].y, 2.0);
    }

    #[test]
    fn test_absent_entries_are_dropped_per_sequence() {
        let old = vec![None, Some(1.0), None, Some(3.0)];
        let new = vec![Some(2.0), Some(2.0), Some(2.0)];
        let spark = normalize(&old, &new, frame()).unwrap();

        assert_eq!(spark.old.len(), 2);
        assert_eq!(spark.new.len(), 3);
        assert_eq!(spark.old[1].x, 120.0);
        assert_eq!(spark.new[1].x, 60.0);
    }

    #[test]
    fn test_series_over_years_uses_union() {
        let param = Parameter {
            label: "SNAP".to_string(),
            unit: Unit::CurrencyUsd,
            category: Category::Spending,
            old: [("2024", 1.0), ("2025", 2.0)].into_iter().collect(),
            new: [("2025", 3.0), ("2026", 4.0)].into_iter().collect(),
            pct_change: YearSeries::new(),
        };

        let (old, new) = series_over_years(&param);
        assert_eq!(old, vec![Some(1.0), Some(2.0), None]);
        assert_eq!(new, vec![None, Some(3.0), Some(4.0)]);
    }

    #[test]
    fn test_glyphs_follow_values() {
        let values = vec![Some(0.0), Some(50.0), Some(100.0)];
        let spark = normalize(&values, &[], frame()).unwrap();
        assert_eq!(to_glyphs(&spark.old, spark.frame), "▁▅█");
    }
}
