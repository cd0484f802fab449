// 📈 Chart Projection - Old/new traces with a shaded delta region
//
// Produces render-ready series; drawing is left to the caller (TUI or a JSON
// client). The delta region is a closed polygon: new values left to right over
// the overlap years, then old values right to left.

use crate::align;
use crate::format;
use crate::model::{AggregateDocument, AggregateMetric, Parameter, Unit, YearSeries};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Baseline {
    Old,
    New,
}

impl Baseline {
    pub fn label(&self) -> &'static str {
        match self {
            Baseline::Old => "Old",
            Baseline::New => "New",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TracePoint {
    pub year: String,
    pub value: f64,
    pub hover: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    pub name: String,
    pub baseline: Baseline,
    pub points: Vec<TracePoint>,
}

impl Trace {
    /// (year, value) pairs with numeric years, for plotting on a numeric axis
    pub fn xy(&self) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .filter_map(|p| align::parse_year(&p.year).map(|y| (y as f64, p.value)))
            .collect()
    }
}

/// Closed polygon between the new and old lines over overlapping years
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaRegion {
    pub years: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartView {
    pub title: String,
    pub y_axis: String,
    pub traces: Vec<Trace>,
    pub delta: Option<DeltaRegion>,
}

impl ChartView {
    /// Min/max over every plotted value, None for an empty chart
    pub fn value_bounds(&self) -> Option<(f64, f64)> {
        let mut values = self.traces.iter().flat_map(|t| t.points.iter().map(|p| p.value));
        let first = values.next()?;
        Some(values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    /// Value bounds widened by 5% of the range. A flat chart gets a band of 5%
    /// of its magnitude (at least 1) so the axis never has zero height.
    pub fn padded_value_bounds(&self) -> Option<(f64, f64)> {
        let (lo, hi) = self.value_bounds()?;
        let pad = if hi > lo {
            (hi - lo) * 0.05
        } else {
            (hi.abs() * 0.05).max(1.0)
        };
        Some((lo - pad, hi + pad))
    }

    pub fn year_bounds(&self) -> Option<(i32, i32)> {
        let mut years = self
            .traces
            .iter()
            .flat_map(|t| t.points.iter().filter_map(|p| align::parse_year(&p.year)));
        let first = years.next()?;
        Some(years.fold((first, first), |(lo, hi), y| (lo.min(y), hi.max(y))))
    }
}

/// Comparison chart for one parameter.
///
/// The old trace is omitted entirely when the old baseline is empty, and the
/// delta region only exists when the two series overlap.
pub fn parameter_chart(param: &Parameter) -> ChartView {
    let formatter = |v: f64| format::format_value(v, param.unit);
    let mut traces = Vec::new();

    if !param.old.is_empty() {
        traces.push(trace(
            "Old baseline",
            Baseline::Old,
            &param.old,
            |year, value| {
                with_change(
                    format!("Year: {} · Old: {}", year, formatter(value)),
                    &param.pct_change,
                    year,
                )
            },
        ));
    }

    traces.push(trace(
        "New baseline",
        Baseline::New,
        &param.new,
        |year, value| {
            with_change(
                format!("Year: {} · New: {}", year, formatter(value)),
                &param.pct_change,
                year,
            )
        },
    ));

    ChartView {
        title: param.label.clone(),
        y_axis: param.unit.axis_title().to_string(),
        traces,
        delta: delta_region(&param.old, &param.new),
    }
}

/// Revenue vs. spending, four traces
pub fn revenue_spending_chart(doc: &AggregateDocument) -> ChartView {
    let revenue = &doc.metrics.total_revenue;
    let spending = &doc.metrics.total_spending;

    let traces = vec![
        aggregate_trace("Revenue", Baseline::Old, revenue, &doc.years),
        aggregate_trace("Revenue", Baseline::New, revenue, &doc.years),
        aggregate_trace("Spending", Baseline::Old, spending, &doc.years),
        aggregate_trace("Spending", Baseline::New, spending, &doc.years),
    ];

    ChartView {
        title: "Revenue vs. mandatory spending over time".to_string(),
        y_axis: Unit::CurrencyUsd.axis_title().to_string(),
        traces,
        delta: None,
    }
}

/// Fiscal balance under both baselines with the delta region
pub fn fiscal_balance_chart(doc: &AggregateDocument) -> ChartView {
    let balance = &doc.metrics.fiscal_balance;

    let mut old = aggregate_trace("Balance", Baseline::Old, balance, &doc.years);
    old.name = "Old baseline".to_string();
    let mut new = aggregate_trace("Balance", Baseline::New, balance, &doc.years);
    new.name = "New baseline".to_string();

    ChartView {
        title: "Fiscal balance (revenue minus mandatory spending)".to_string(),
        y_axis: Unit::CurrencyUsd.axis_title().to_string(),
        traces: vec![old, new],
        delta: delta_region(&balance.old, &balance.new),
    }
}

fn trace<F>(name: &str, baseline: Baseline, series: &YearSeries, hover: F) -> Trace
where
    F: Fn(&str, f64) -> String,
{
    let points = align::sorted_years(series)
        .into_iter()
        .filter_map(|year| {
            let value = series.get(&year)?;
            Some(TracePoint {
                hover: hover(&year, value),
                year,
                value,
            })
        })
        .collect();

    Trace {
        name: name.to_string(),
        baseline,
        points,
    }
}

/// Aggregate traces follow the document's shared year axis
fn aggregate_trace(name: &str, baseline: Baseline, metric: &AggregateMetric, years: &[String]) -> Trace {
    let series = match baseline {
        Baseline::Old => &metric.old,
        Baseline::New => &metric.new,
    };
    let tag = baseline.label().to_lowercase();

    let points = years
        .iter()
        .filter_map(|year| {
            let value = series.get(year)?;
            Some(TracePoint {
                year: year.clone(),
                value,
                hover: format!(
                    "Year: {} · {} ({}): {}",
                    year,
                    name,
                    tag,
                    format::format_currency(value)
                ),
            })
        })
        .collect();

    Trace {
        name: format!("{} ({})", name, tag),
        baseline,
        points,
    }
}

fn with_change(mut hover: String, pct_change: &YearSeries, year: &str) -> String {
    if let Some(pct) = pct_change.get(year) {
        hover.push_str(" · Change: ");
        hover.push_str(&format::format_percent(pct));
    }
    hover
}

/// Shaded region between old and new, None without overlap
pub fn delta_region(old: &YearSeries, new: &YearSeries) -> Option<DeltaRegion> {
    let overlap = align::align(old, new).overlap;
    if overlap.is_empty() {
        return None;
    }

    let mut years = overlap.clone();
    let mut values: Vec<f64> = overlap.iter().filter_map(|y| new.get(y)).collect();
    for year in overlap.iter().rev() {
        years.push(year.clone());
        if let Some(v) = old.get(year) {
            values.push(v);
        }
    }

    Some(DeltaRegion { years, values })
}
