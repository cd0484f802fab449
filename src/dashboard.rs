// 🧭 Dashboard State - One view session over the two snapshots
//
// Dashboard is plain state plus pure projections. ViewSession owns the
// in-flight fetches of one mount and their cancellation token.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::chart::{self, ChartView};
use crate::derive::{self, MetricCard, ParameterCard};
use crate::fetch::{self, CancelToken, LoadState, Outcome, SnapshotSource};
use crate::heatmap::{self, HeatmapMatrix};
use crate::model::{AggregateDocument, CategoryFilter, ComparisonDocument};

// ============================================================================
// DASHBOARD
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    pub comparison: LoadState<ComparisonDocument>,
    pub aggregate: LoadState<AggregateDocument>,
    pub filter: CategoryFilter,
    /// Parameter whose comparison chart is open
    pub selected: Option<String>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dashboard over already-fetched documents
    pub fn with_documents(comparison: Option<ComparisonDocument>, aggregate: Option<AggregateDocument>) -> Self {
        Self {
            comparison: LoadState::Ready(comparison.map(Arc::new)),
            aggregate: LoadState::Ready(aggregate.map(Arc::new)),
            ..Self::default()
        }
    }

    /// Apply a comparison fetch outcome. Returns true if state changed.
    pub fn apply_comparison(&mut self, outcome: Outcome<ComparisonDocument>) -> bool {
        match outcome {
            Outcome::Commit(state) => {
                self.comparison = state;
                // Selection may point at a key the new snapshot lacks
                if let Some(key) = &self.selected {
                    let still_there = self
                        .comparison
                        .data()
                        .map_or(false, |doc| doc.parameters.contains_key(key));
                    if !still_there {
                        self.selected = None;
                    }
                }
                true
            }
            Outcome::Discarded => false,
        }
    }

    pub fn apply_aggregate(&mut self, outcome: Outcome<AggregateDocument>) -> bool {
        match outcome {
            Outcome::Commit(state) => {
                self.aggregate = state;
                true
            }
            Outcome::Discarded => false,
        }
    }

    pub fn set_filter(&mut self, filter: CategoryFilter) {
        self.filter = filter;
    }

    pub fn select(&mut self, key: &str) -> bool {
        let exists = self
            .comparison
            .data()
            .map_or(false, |doc| doc.parameters.contains_key(key));
        if exists {
            self.selected = Some(key.to_string());
        }
        exists
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Cards for the parameters passing the current filter
    pub fn cards(&self) -> Vec<ParameterCard> {
        match self.comparison.data() {
            Some(doc) => doc
                .filtered(self.filter)
                .map(|(key, param)| ParameterCard::build(key, param))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn heatmap(&self) -> Option<HeatmapMatrix> {
        heatmap::build(self.comparison.data()?, self.filter)
    }

    pub fn selected_chart(&self) -> Option<ChartView> {
        let key = self.selected.as_deref()?;
        let param = self.comparison.data()?.parameter(key)?;
        Some(chart::parameter_chart(param))
    }

    pub fn metric_cards(&self) -> Vec<MetricCard> {
        self.aggregate.data().map(derive::metric_cards).unwrap_or_default()
    }

    /// Revenue/spending chart and fiscal balance chart
    pub fn aggregate_charts(&self) -> Option<(ChartView, ChartView)> {
        let doc = self.aggregate.data()?;
        Some((chart::revenue_spending_chart(doc), chart::fiscal_balance_chart(doc)))
    }
}

// ============================================================================
// VIEW SESSION
// ============================================================================

#[derive(Debug)]
pub enum Update {
    Comparison(Outcome<ComparisonDocument>),
    Aggregate(Outcome<AggregateDocument>),
}

/// Fetch results tagged with the token of the mount that issued them
#[derive(Debug)]
pub struct Delivery {
    pub token: CancelToken,
    pub update: Update,
}

/// In-flight fetches for one mounted view.
///
/// Dropping or tearing down the session cancels its token; results that arrive
/// afterwards are never applied.
pub struct ViewSession {
    source: Arc<dyn SnapshotSource>,
    token: CancelToken,
    tx: mpsc::UnboundedSender<Delivery>,
    rx: mpsc::UnboundedReceiver<Delivery>,
}

impl ViewSession {
    /// Mount the view: issue one fetch per document. Needs a tokio runtime.
    pub fn mount(source: Arc<dyn SnapshotSource>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            source,
            token: CancelToken::new(),
            tx,
            rx,
        };
        session.spawn_fetches();
        session
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    fn spawn_fetches(&self) {
        let source = Arc::clone(&self.source);
        let token = self.token.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = fetch::load_comparison(source.as_ref(), &token).await;
            let _ = tx.send(Delivery {
                token,
                update: Update::Comparison(outcome),
            });
        });

        let source = Arc::clone(&self.source);
        let token = self.token.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = fetch::load_aggregate(source.as_ref(), &token).await;
            let _ = tx.send(Delivery {
                token,
                update: Update::Aggregate(outcome),
            });
        });
    }

    /// Explicit re-fetch: cancel the previous round and start over
    pub fn refetch(&mut self, dashboard: &mut Dashboard) {
        tracing::info!("re-fetching snapshots");
        self.token.cancel();
        self.token = CancelToken::new();
        dashboard.comparison = LoadState::Loading;
        dashboard.aggregate = LoadState::Loading;
        self.spawn_fetches();
    }

    /// Apply every delivery that has arrived. Returns true if anything changed.
    pub fn drain(&mut self, dashboard: &mut Dashboard) -> bool {
        let mut changed = false;
        while let Ok(delivery) = self.rx.try_recv() {
            changed |= apply_delivery(dashboard, delivery);
        }
        changed
    }

    /// Wait for the next delivery and apply it
    pub async fn next(&mut self, dashboard: &mut Dashboard) -> Option<bool> {
        let delivery = self.rx.recv().await?;
        Some(apply_delivery(dashboard, delivery))
    }

    pub fn teardown(self) {
        // Drop does the work
    }
}

impl Drop for ViewSession {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

fn apply_delivery(dashboard: &mut Dashboard, delivery: Delivery) -> bool {
    // Commit point: a cancelled mount never writes state
    if delivery.token.is_cancelled() {
        tracing::debug!("dropping delivery from cancelled mount");
        return false;
    }
    match delivery.update {
        Update::Comparison(outcome) => dashboard.apply_comparison(outcome),
        Update::Aggregate(outcome) => dashboard.apply_aggregate(outcome),
    }
}

/// One-shot load of both documents (CLI commands, server startup)
pub async fn load_once(source: &dyn SnapshotSource) -> Dashboard {
    let token = CancelToken::new();
    let (comparison, aggregate) = tokio::join!(
        fetch::load_comparison(source, &token),
        fetch::load_aggregate(source, &token),
    );

    let mut dashboard = Dashboard::new();
    dashboard.apply_comparison(comparison);
    dashboard.apply_aggregate(aggregate);
    dashboard
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchError, Resource};
    use crate::model::Category;
    use async_trait::async_trait;

    const COMPARISON: &str = r#"{
        "metadata": {
            "old_baseline": "February 2024",
            "new_baseline": "February 2026",
            "source_url": "https://www.cbo.gov/data/budget-economic-data",
            "generated_at": "2026-02-13T00:00:00Z"
        },
        "parameters": {
            "income_tax": {
                "label": "Individual income tax revenue",
                "unit": "currency-USD",
                "category": "revenue",
                "old": {"2024": 2400000000000, "2025": 2520000000000},
                "new": {"2025": 2621342000000, "2026": 2700000000000},
                "pct_change": {"2025": 4.02}
            },
            "snap": {
                "label": "SNAP outlays",
                "unit": "currency-USD",
                "category": "spending",
                "old": {"2023": 110000000000},
                "new": {"2026": 98000000000},
                "pct_change": {"2026": -8.5}
            }
        }
    }"#;

    const AGGREGATE: &str = r#"{
        "metadata": {
            "old_baseline": "February 2024",
            "new_baseline": "February 2026",
            "source_url": "https://www.cbo.gov/data/budget-economic-data",
            "generated_at": "2026-02-13T00:00:00Z",
            "revenue_components": ["income_tax"],
            "spending_components": ["snap"]
        },
        "years": ["2025", "2026"],
        "metrics": {
            "total_revenue": {"label": "Total federal revenue", "description": "Income tax", "old": {"2025": 2520000000000}, "new": {"2025": 2621342000000, "2026": 2700000000000}, "pct_change": {"2025": 4.02}, "diff": {"2025": 101342000000}},
            "total_spending": {"label": "Total mandatory spending", "description": "SNAP", "old": {}, "new": {"2026": 98000000000}, "pct_change": {}, "diff": {}},
            "fiscal_balance": {"label": "Fiscal balance", "description": "Revenue minus spending", "old": {}, "new": {}, "pct_change": {}, "diff": {}}
        }
    }"#;

    struct Fixture;

    #[async_trait]
    impl SnapshotSource for Fixture {
        async fn fetch_raw(&self, resource: Resource) -> Result<Vec<u8>, FetchError> {
            match resource {
                Resource::Comparison => Ok(COMPARISON.as_bytes().to_vec()),
                Resource::Aggregate => Ok(AGGREGATE.as_bytes().to_vec()),
            }
        }

        fn describe(&self) -> String {
            "fixture".to_string()
        }
    }

    fn ready() -> Dashboard {
        Dashboard::with_documents(
            Some(serde_json::from_str(COMPARISON).unwrap()),
            Some(serde_json::from_str(AGGREGATE).unwrap()),
        )
    }

    #[test]
    fn test_cards_follow_filter() {
        let mut dashboard = ready();
        assert_eq!(dashboard.cards().len(), 2);

        dashboard.set_filter(CategoryFilter::Only(Category::Spending));
        let cards = dashboard.cards();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].key, "snap");

        dashboard.set_filter(CategoryFilter::Only(Category::Income));
        assert!(dashboard.cards().is_empty());
        assert!(dashboard.heatmap().is_none());
    }

    #[test]
    fn test_selection_and_chart() {
        let mut dashboard = ready();
        assert!(dashboard.selected_chart().is_none());
        assert!(!dashboard.select("missing"));
        assert!(dashboard.select("income_tax"));

        let chart = dashboard.selected_chart().unwrap();
        assert_eq!(chart.title, "Individual income tax revenue");
        assert!(chart.delta.is_some());

        dashboard.clear_selection();
        assert!(dashboard.selected_chart().is_none());
    }

    #[test]
    fn test_discarded_outcome_leaves_state() {
        let mut dashboard = Dashboard::new();
        assert!(!dashboard.apply_comparison(Outcome::Discarded));
        assert!(dashboard.comparison.is_loading());
    }

    #[test]
    fn test_empty_snapshot_renders_nothing() {
        let dashboard = Dashboard::with_documents(None, None);
        assert!(dashboard.cards().is_empty());
        assert!(dashboard.heatmap().is_none());
        assert!(dashboard.metric_cards().is_empty());
        assert!(dashboard.aggregate_charts().is_none());
    }

    #[tokio::test]
    async fn test_load_once_end_to_end() {
        let dashboard = load_once(&Fixture).await;

        let cards = dashboard.cards();
        let income = &cards[0];
        assert_eq!(income.year.as_deref(), Some("2025"));
        match &income.values {
            derive::CardValues::Compared { old_text, new_text, badge } => {
                assert_eq!(old_text, "$2.52 T");
                assert_eq!(new_text, "$2.62 T");
                assert_eq!(badge.as_ref().unwrap().text, "4.0%");
            }
            other => panic!("expected compared card, got {:?}", other),
        }

        // SNAP baselines never overlap: new value only
        assert_eq!(
            cards[1].values,
            derive::CardValues::NewOnly {
                new_text: "$98.00 B".to_string()
            }
        );

        let metrics = dashboard.metric_cards();
        assert_eq!(metrics.len(), 3);
        assert_eq!(metrics[0].year, "2025");
        assert_eq!(metrics[2].footnote(), "No data for 2025");

        let heatmap = dashboard.heatmap().unwrap();
        assert_eq!(heatmap.years, vec!["2025", "2026"]);
    }

    #[tokio::test]
    async fn test_session_delivers_both_documents() {
        let mut dashboard = Dashboard::new();
        let mut session = ViewSession::mount(Arc::new(Fixture));

        let mut applied = 0;
        while applied < 2 {
            if session.next(&mut dashboard).await == Some(true) {
                applied += 1;
            }
        }

        assert!(dashboard.comparison.data().is_some());
        assert!(dashboard.aggregate.data().is_some());
    }

    #[tokio::test]
    async fn test_refetch_ignores_previous_round() {
        let mut dashboard = Dashboard::new();
        let mut session = ViewSession::mount(Arc::new(Fixture));
        let first = session.token().clone();

        session.refetch(&mut dashboard);
        assert!(first.is_cancelled());
        assert!(!session.token().is_cancelled());

        // Only the second round may commit, so exactly two updates apply
        let mut applied = 0;
        while applied < 2 {
            match session.next(&mut dashboard).await {
                Some(true) => applied += 1,
                Some(false) => {}
                None => break,
            }
        }
        assert_eq!(applied, 2);
        assert!(dashboard.comparison.data().is_some());
    }

    #[tokio::test]
    async fn test_teardown_cancels_token() {
        let session = ViewSession::mount(Arc::new(Fixture));
        let token = session.token().clone();
        session.teardown();
        assert!(token.is_cancelled());
    }
}
