// 🧮 Metric Derivation - Guarded lookups and summary cards
//
// Percent-change and diff values are trusted inputs. Nothing in this module
// recomputes them from old/new; a missing key hides the one element that
// needed it and nothing else.

use crate::align::{self, ComparisonYear};
use crate::format;
use crate::model::{AggregateDocument, AggregateMetric, Category, Parameter, YearSeries};
use crate::sparkline::{self, Sparkline};
use serde::Serialize;

/// Guarded lookup: absent stays absent, never zero
pub fn value_at(series: &YearSeries, year: &str) -> Option<f64> {
    series.get(year)
}

// ============================================================================
// PARAMETER CARDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn of(pct: f64) -> Self {
        if pct >= 0.0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }
}

/// Percent-change badge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Badge {
    pub value: f64,
    pub text: String,
    pub direction: Direction,
}

impl Badge {
    pub fn new(pct: f64) -> Self {
        Badge {
            value: pct,
            text: format::format_percent(pct),
            direction: Direction::of(pct),
        }
    }
}

/// What a card shows for its anchor year
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CardValues {
    /// Both baselines report the anchor year
    Compared {
        old_text: String,
        new_text: String,
        badge: Option<Badge>,
    },
    /// Old baseline never overlaps: show the latest new value alone
    NewOnly { new_text: String },
    /// Nothing to show
    Empty,
}

/// Summary card for one parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterCard {
    pub key: String,
    pub label: String,
    pub category: Category,
    /// Year the card is anchored on
    pub year: Option<String>,
    pub comparison: ComparisonYear,
    pub values: CardValues,
    pub sparkline: Option<Sparkline>,
}

impl ParameterCard {
    pub fn build(key: &str, param: &Parameter) -> Self {
        let comparison = align::comparison_year(&param.old, &param.new);

        let (year, values) = match &comparison {
            ComparisonYear::Year(year) => (Some(year.clone()), compared_values(param, year)),
            ComparisonYear::NoOverlap => match align::latest_year(&param.new) {
                Some(year) => {
                    let values = match value_at(&param.new, &year) {
                        Some(new) => CardValues::NewOnly {
                            new_text: format::format_value(new, param.unit),
                        },
                        None => CardValues::Empty,
                    };
                    (Some(year), values)
                }
                None => (None, CardValues::Empty),
            },
        };

        ParameterCard {
            key: key.to_string(),
            label: param.label.clone(),
            category: param.category,
            year,
            comparison,
            values,
            sparkline: sparkline::for_parameter(param, sparkline::Frame::default()),
        }
    }

    pub fn badge(&self) -> Option<&Badge> {
        match &self.values {
            CardValues::Compared { badge, .. } => badge.as_ref(),
            _ => None,
        }
    }
}

fn compared_values(param: &Parameter, year: &str) -> CardValues {
    match (value_at(&param.old, year), value_at(&param.new, year)) {
        (Some(old), Some(new)) => CardValues::Compared {
            old_text: format::format_value(old, param.unit),
            new_text: format::format_value(new, param.unit),
            badge: value_at(&param.pct_change, year).map(Badge::new),
        },
        (None, Some(new)) => CardValues::NewOnly {
            new_text: format::format_value(new, param.unit),
        },
        _ => CardValues::Empty,
    }
}

// ============================================================================
// AGGREGATE METRIC CARDS
// ============================================================================

/// Year all three aggregate cards are anchored on.
///
/// The last listed year where total revenue has both baselines, else the last
/// listed year.
pub fn aggregate_anchor_year(doc: &AggregateDocument) -> Option<String> {
    let revenue = &doc.metrics.total_revenue;
    doc.years
        .iter()
        .rev()
        .find(|y| revenue.old.contains(y) && revenue.new.contains(y))
        .or_else(|| doc.years.last())
        .cloned()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricValues {
    Compared {
        old_text: String,
        new_text: String,
        badge: Option<Badge>,
        /// "(+$x)" style diff, when supplied
        diff_text: Option<String>,
    },
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCard {
    pub key: String,
    pub label: String,
    pub description: String,
    pub year: String,
    pub values: MetricValues,
}

impl MetricCard {
    pub fn build(key: &str, metric: &AggregateMetric, year: &str) -> Self {
        let values = match (value_at(&metric.old, year), value_at(&metric.new, year)) {
            (Some(old), Some(new)) => MetricValues::Compared {
                old_text: format::format_currency(old),
                new_text: format::format_currency(new),
                badge: value_at(&metric.pct_change, year).map(Badge::new),
                diff_text: value_at(&metric.diff, year)
                    .map(|d| format!("({})", format::format_signed_diff(d))),
            },
            _ => MetricValues::NoData,
        };

        MetricCard {
            key: key.to_string(),
            label: metric.label.clone(),
            description: metric.description.clone(),
            year: year.to_string(),
            values,
        }
    }

    /// Footer line under the card values
    pub fn footnote(&self) -> String {
        match self.values {
            MetricValues::Compared { .. } => format!("in {}", self.year),
            MetricValues::NoData => format!("No data for {}", self.year),
        }
    }
}

/// Cards for total revenue, total spending and fiscal balance
pub fn metric_cards(doc: &AggregateDocument) -> Vec<MetricCard> {
    let Some(year) = aggregate_anchor_year(doc) else {
        return Vec::new();
    };

    doc.metrics
        .all()
        .iter()
        .map(|(key, metric)| MetricCard::build(key, metric, &year))
        .collect()
}
