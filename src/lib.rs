// Fiscal Shift - Core Library
// Baseline-to-baseline comparison views for the CLI, TUI and API server

pub mod model;
pub mod format;
pub mod align;
pub mod derive;
pub mod sparkline;
pub mod heatmap;
pub mod chart;
pub mod fetch;
pub mod dashboard;
pub mod export;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use model::{
    AggregateDocument, AggregateMetadata, AggregateMetric, AggregateMetrics,
    Category, CategoryFilter, ComparisonDocument, Metadata, Parameter, Unit, YearSeries,
};
pub use format::{
    format_count, format_currency, format_index, format_percent, format_percent_with,
    format_signed_diff, format_value,
};
pub use align::{align, comparison_year, Alignment, ComparisonYear};
pub use derive::{
    metric_cards, value_at, Badge, CardValues, Direction, MetricCard, MetricValues, ParameterCard,
};
pub use sparkline::{normalize, Frame, Point, Sparkline};
pub use heatmap::{HeatmapCell, HeatmapMatrix};
pub use chart::{ChartView, DeltaRegion, Trace};
pub use fetch::{
    CancelToken, FetchError, FileSource, HttpSource, LoadState, Outcome, Resource, SnapshotSource,
};
pub use dashboard::{Dashboard, ViewSession};
pub use config::{Config, SourceConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
