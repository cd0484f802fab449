// 📦 Data Model - Baseline snapshots
// Two immutable documents: parameter-level comparison + pre-aggregated roll-ups

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CLOSED ENUMERATIONS
// ============================================================================

/// Unit a parameter is reported in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "currency-USD")]
    CurrencyUsd,
    #[serde(rename = "index")]
    Index,
}

impl Unit {
    /// Axis title used by charts
    pub fn axis_title(&self) -> &'static str {
        match self {
            Unit::CurrencyUsd => "USD",
            Unit::Index => "Index",
        }
    }
}

/// Parameter category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Revenue,
    Spending,
    Income,
    Cpi,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Revenue,
        Category::Spending,
        Category::Income,
        Category::Cpi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Revenue => "revenue",
            Category::Spending => "spending",
            Category::Income => "income",
            Category::Cpi => "cpi",
        }
    }

    /// Display name
    pub fn label(&self) -> &'static str {
        match self {
            Category::Revenue => "Revenue",
            Category::Spending => "Spending",
            Category::Income => "Income",
            Category::Cpi => "CPI",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category filter: "all" or exactly one category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    /// Filter options in display order
    pub const OPTIONS: [CategoryFilter; 5] = [
        CategoryFilter::All,
        CategoryFilter::Only(Category::Revenue),
        CategoryFilter::Only(Category::Spending),
        CategoryFilter::Only(Category::Income),
        CategoryFilter::Only(Category::Cpi),
    ];

    pub fn matches(&self, category: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(wanted) => *wanted == category,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CategoryFilter::All => "All",
            CategoryFilter::Only(category) => category.label(),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "" => Ok(CategoryFilter::All),
            "revenue" => Ok(CategoryFilter::Only(Category::Revenue)),
            "spending" => Ok(CategoryFilter::Only(Category::Spending)),
            "income" => Ok(CategoryFilter::Only(Category::Income)),
            "cpi" => Ok(CategoryFilter::Only(Category::Cpi)),
            other => Err(anyhow::anyhow!("Unknown category filter: {}", other)),
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str("all"),
            CategoryFilter::Only(category) => write!(f, "{}", category),
        }
    }
}

// ============================================================================
// SPARSE YEAR SERIES
// ============================================================================

/// Sparse mapping from a year key ("2025") to a value.
///
/// Keys are kept exactly as they appear in the document. Nothing here assumes
/// the keys are contiguous or that two series share the same key set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct YearSeries(BTreeMap<String, f64>);

impl YearSeries {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, year: &str) -> Option<f64> {
        self.0.get(year).copied()
    }

    pub fn contains(&self, year: &str) -> bool {
        self.0.contains_key(year)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for YearSeries {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

// ============================================================================
// COMPARISON DOCUMENT
// ============================================================================

/// Baseline metadata shared by both documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Name of the older baseline, e.g. "February 2024"
    pub old_baseline: String,
    pub new_baseline: String,
    pub source_url: String,
    /// Raw generation timestamp as published
    pub generated_at: String,
}

impl Metadata {
    /// Parsed generation timestamp, None when it is not RFC 3339
    pub fn generated_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.generated_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// One tracked fiscal quantity under two baselines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub label: String,
    pub unit: Unit,
    pub category: Category,
    pub old: YearSeries,
    pub new: YearSeries,
    pub pct_change: YearSeries,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonDocument {
    pub metadata: Metadata,
    /// Parameters in document order
    pub parameters: IndexMap<String, Parameter>,
}

impl ComparisonDocument {
    pub fn parameter(&self, key: &str) -> Option<&Parameter> {
        self.parameters.get(key)
    }

    /// Parameters passing the filter, in document order
    pub fn filtered(&self, filter: CategoryFilter) -> impl Iterator<Item = (&str, &Parameter)> {
        self.parameters
            .iter()
            .filter(move |(_, param)| filter.matches(param.category))
            .map(|(key, param)| (key.as_str(), param))
    }
}

// ============================================================================
// AGGREGATE DOCUMENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetadata {
    #[serde(flatten)]
    pub baseline: Metadata,
    /// Parameter keys summed into total revenue
    #[serde(default)]
    pub revenue_components: Vec<String>,
    /// Parameter keys summed into total spending
    #[serde(default)]
    pub spending_components: Vec<String>,
}

/// Pre-computed roll-up metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetric {
    pub label: String,
    pub description: String,
    pub old: YearSeries,
    pub new: YearSeries,
    pub pct_change: YearSeries,
    pub diff: YearSeries,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub total_revenue: AggregateMetric,
    pub total_spending: AggregateMetric,
    pub fiscal_balance: AggregateMetric,
}

impl AggregateMetrics {
    /// The three metrics in display order
    pub fn all(&self) -> [(&'static str, &AggregateMetric); 3] {
        [
            ("total_revenue", &self.total_revenue),
            ("total_spending", &self.total_spending),
            ("fiscal_balance", &self.fiscal_balance),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateDocument {
    pub metadata: AggregateMetadata,
    /// Shared ordered year axis for every metric
    pub years: Vec<String>,
    pub metrics: AggregateMetrics,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const COMPARISON_JSON: &str = r#"{
        "metadata": {
            "old_baseline": "February 2024",
            "new_baseline": "February 2026",
            "source_url": "https://www.cbo.gov/data/budget-economic-data",
            "generated_at": "2026-02-13T00:00:00Z"
        },
        "parameters": {
            "snap": {
                "label": "SNAP outlays",
                "unit": "currency-USD",
                "category": "spending",
                "old": {"2025": 1.0},
                "new": {"2025": 2.0},
                "pct_change": {"2025": 100.0}
            },
            "cpi_u": {
                "label": "CPI-U",
                "unit": "index",
                "category": "cpi",
                "old": {},
                "new": {"2026": 325.876},
                "pct_change": {}
            },
            "income_tax": {
                "label": "Individual income tax revenue",
                "unit": "currency-USD",
                "category": "revenue",
                "old": {"2025": 2520000000000},
                "new": {"2025": 2621342000000},
                "pct_change": {"2025": 4.02}
            }
        }
    }"#;

    #[test]
    fn test_parameters_keep_document_order() {
        let doc: ComparisonDocument = serde_json::from_str(COMPARISON_JSON).unwrap();
        let keys: Vec<&str> = doc.parameters.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["snap", "cpi_u", "income_tax"]);
    }

    #[test]
    fn test_closed_enums_decode() {
        let doc: ComparisonDocument = serde_json::from_str(COMPARISON_JSON).unwrap();
        assert_eq!(doc.parameters["cpi_u"].unit, Unit::Index);
        assert_eq!(doc.parameters["cpi_u"].category, Category::Cpi);
        assert_eq!(doc.parameters["snap"].unit, Unit::CurrencyUsd);
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let bad = COMPARISON_JSON.replace("\"spending\"", "\"defense\"");
        assert!(serde_json::from_str::<ComparisonDocument>(&bad).is_err());
    }

    #[test]
    fn test_filtered_respects_category() {
        let doc: ComparisonDocument = serde_json::from_str(COMPARISON_JSON).unwrap();

        let revenue: Vec<&str> = doc
            .filtered(CategoryFilter::Only(Category::Revenue))
            .map(|(key, _)| key)
            .collect();
        assert_eq!(revenue, vec!["income_tax"]);

        assert_eq!(doc.filtered(CategoryFilter::All).count(), 3);
        assert_eq!(doc.filtered(CategoryFilter::Only(Category::Income)).count(), 0);
    }

    #[test]
    fn test_category_filter_parse() {
        assert_eq!("all".parse::<CategoryFilter>().unwrap(), CategoryFilter::All);
        assert_eq!(
            "CPI".parse::<CategoryFilter>().unwrap(),
            CategoryFilter::Only(Category::Cpi)
        );
        assert!("defense".parse::<CategoryFilter>().is_err());
    }

    #[test]
    fn test_generated_at_parses() {
        let doc: ComparisonDocument = serde_json::from_str(COMPARISON_JSON).unwrap();
        let ts = doc.metadata.generated_at_utc().unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-02-13T00:00:00+00:00");
    }

    #[test]
    fn test_aggregate_metadata_flattens_baseline() {
        let json = r#"{
            "metadata": {
                "old_baseline": "February 2024",
                "new_baseline": "February 2026",
                "source_url": "https://example.org",
                "generated_at": "2026-02-13T00:00:00Z",
                "revenue_components": ["income_tax", "payroll_taxes"],
                "spending_components": ["snap"]
            },
            "years": ["2025", "2026"],
            "metrics": {
                "total_revenue": {"label": "R", "description": "", "old": {}, "new": {}, "pct_change": {}, "diff": {}},
                "total_spending": {"label": "S", "description": "", "old": {}, "new": {}, "pct_change": {}, "diff": {}},
                "fiscal_balance": {"label": "B", "description": "", "old": {"2025": -1.5}, "new": {}, "pct_change": {}, "diff": {}}
            }
        }"#;

        let doc: AggregateDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.metadata.baseline.old_baseline, "February 2024");
        assert_eq!(doc.metadata.revenue_components.len(), 2);
        assert_eq!(doc.metrics.fiscal_balance.old.get("2025"), Some(-1.5));
        assert_eq!(doc.metrics.all()[2].0, "fiscal_balance");
    }
}
