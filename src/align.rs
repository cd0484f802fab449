// 📅 Time Series Aligner
// Year overlap and "latest comparable year" between two sparse series
//
// Year keys are ordered as integers, never lexicographically ("999" < "2025").
// Keys that do not parse as a year are skipped.

use crate::model::YearSeries;
use serde::Serialize;
use std::collections::BTreeMap;

/// Latest year both series report, or an explicit no-overlap outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "year", rename_all = "snake_case")]
pub enum ComparisonYear {
    Year(String),
    NoOverlap,
}

impl ComparisonYear {
    pub fn year(&self) -> Option<&str> {
        match self {
            ComparisonYear::Year(year) => Some(year.as_str()),
            ComparisonYear::NoOverlap => None,
        }
    }
}

/// Alignment of one old/new series pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alignment {
    /// Union of years present in either series, ascending
    pub years: Vec<String>,
    /// Years present in both series, ascending
    pub overlap: Vec<String>,
    pub comparison: ComparisonYear,
}

impl Alignment {
    pub fn has_overlap(&self) -> bool {
        !self.overlap.is_empty()
    }
}

/// Parse a year key. Surrounding whitespace is tolerated.
pub fn parse_year(key: &str) -> Option<i32> {
    key.trim().parse::<i32>().ok()
}

/// Keys of a series ordered by their numeric year
pub fn sorted_years(series: &YearSeries) -> Vec<String> {
    numeric_keys(series).into_values().collect()
}

/// Latest year key of a single series
pub fn latest_year(series: &YearSeries) -> Option<String> {
    numeric_keys(series).into_values().next_back()
}

/// Align two sparse series
pub fn align(old: &YearSeries, new: &YearSeries) -> Alignment {
    let old_years = numeric_keys(old);
    let new_years = numeric_keys(new);

    let mut union: BTreeMap<i32, String> = old_years.clone();
    for (year, key) in &new_years {
        union.entry(*year).or_insert_with(|| key.clone());
    }

    // Overlap is decided by the literal key, so "2025" and " 2025" never pair up
    let overlap: Vec<String> = old_years
        .iter()
        .filter(|(_, key)| new.contains(key))
        .map(|(_, key)| key.clone())
        .collect();

    let comparison = match overlap.last() {
        Some(year) => ComparisonYear::Year(year.clone()),
        None => ComparisonYear::NoOverlap,
    };

    Alignment {
        years: union.into_values().collect(),
        overlap,
        comparison,
    }
}

/// Comparison year only
pub fn comparison_year(old: &YearSeries, new: &YearSeries) -> ComparisonYear {
    align(old, new).comparison
}

fn numeric_keys(series: &YearSeries) -> BTreeMap<i32, String> {
    let mut out = BTreeMap::new();
    for key in series.keys() {
        match parse_year(key) {
            Some(year) => {
                out.insert(year, key.to_string());
            }
            None => tracing::debug!(key, "skipping non-numeric year key"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(pairs: &[(&str, f64)]) -> YearSeries {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_comparison_year_is_latest_shared() {
        let old = series(&[("2025", 1.0)]);
        let new = series(&[("2025", 2.0), ("2026", 3.0)]);

        let alignment = align(&old, &new);
        assert_eq!(alignment.comparison, ComparisonYear::Year("2025".to_string()));
        assert_eq!(alignment.years, vec!["2025", "2026"]);
        assert_eq!(alignment.overlap, vec!["2025"]);
    }

    #[test]
    fn test_disjoint_series_have_no_overlap() {
        let old = series(&[("2023", 1.0), ("2024", 1.0)]);
        let new = series(&[("2025", 2.0)]);

        let alignment = align(&old, &new);
        assert_eq!(alignment.comparison, ComparisonYear::NoOverlap);
        assert!(!alignment.has_overlap());
        assert_eq!(alignment.years, vec!["2023", "2024", "2025"]);
    }

    #[test]
    fn test_empty_series() {
        let alignment = align(&YearSeries::new(), &YearSeries::new());
        assert!(alignment.years.is_empty());
        assert_eq!(alignment.comparison, ComparisonYear::NoOverlap);
    }

    #[test]
    fn test_years_ordered_numerically() {
        let old = series(&[("999", 1.0), ("10000", 1.0)]);
        let new = series(&[("2025", 1.0), ("999", 2.0), ("10000", 3.0)]);

        let alignment = align(&old, &new);
        assert_eq!(alignment.years, vec!["999", "2025", "10000"]);
        assert_eq!(alignment.comparison.year(), Some("10000"));
    }

    #[test]
    fn test_non_numeric_keys_are_skipped() {
        let old = series(&[("total", 9.0), ("2025", 1.0)]);
        let new = series(&[("total", 9.0), ("2025", 2.0)]);

        let alignment = align(&old, &new);
        assert_eq!(alignment.years, vec!["2025"]);
        assert_eq!(alignment.comparison.year(), Some("2025"));
    }

    #[test]
    fn test_latest_year() {
        let s = series(&[("2030", 1.0), ("2029", 2.0), ("999", 3.0)]);
        assert_eq!(latest_year(&s), Some("2030".to_string()));
        assert_eq!(latest_year(&YearSeries::new()), None);
        assert_eq!(sorted_years(&s), vec!["999", "2029", "2030"]);
    }
}
