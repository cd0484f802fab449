// 🌐 Data Source Adapter - Snapshot fetch with explicit cancellation
//
// One fetch per document per view mount. The caller's CancelToken is checked
// right before anything is committed; a late result is dropped, not applied.
// No retries and no timeout at this layer.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::model::{AggregateDocument, ComparisonDocument};

// ============================================================================
// RESOURCES
// ============================================================================

/// The two documents the dashboard consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Comparison,
    Aggregate,
}

impl Resource {
    /// Path relative to the data root
    pub fn path(&self) -> &'static str {
        match self {
            Resource::Comparison => "data/cbo_comparison.json",
            Resource::Aggregate => "data/aggregate_impacts.json",
        }
    }

    /// Name used in error messages
    pub fn noun(&self) -> &'static str {
        match self {
            Resource::Comparison => "data",
            Resource::Aggregate => "aggregate data",
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Fetch failure. Display is the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Transport-level failure, surfaced verbatim
    #[error("{0}")]
    Transport(String),

    #[error("Failed to fetch {resource}: {status} {status_text}")]
    Status {
        resource: &'static str,
        status: u16,
        status_text: String,
    },

    #[error("Failed to decode {resource}: {message}")]
    Decode {
        resource: &'static str,
        message: String,
    },
}

impl FetchError {
    pub fn status(resource: Resource, status: u16, status_text: impl Into<String>) -> Self {
        FetchError::Status {
            resource: resource.noun(),
            status,
            status_text: status_text.into(),
        }
    }
}

// ============================================================================
// CANCELLATION
// ============================================================================

/// Cancellation flag shared between a view and its in-flight fetches
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// SOURCES
// ============================================================================

/// Where snapshots come from
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Raw document body
    async fn fetch_raw(&self, resource: Resource) -> Result<Vec<u8>, FetchError>;

    /// Human-readable origin for logs
    fn describe(&self) -> String;
}

/// HTTP GET against `<base_url>/<resource path>`
pub struct HttpSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn url_for(&self, resource: Resource) -> String {
        format!("{}/{}", self.base_url, resource.path())
    }
}

#[async_trait]
impl SnapshotSource for HttpSource {
    async fn fetch_raw(&self, resource: Resource) -> Result<Vec<u8>, FetchError> {
        let url = self.url_for(resource);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(resource, status));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(body.to_vec())
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

/// Local directory holding `data/*.json`
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SnapshotSource for FileSource {
    async fn fetch_raw(&self, resource: Resource) -> Result<Vec<u8>, FetchError> {
        let path = self.root.join(resource.path());
        tokio::fs::read(&path)
            .await
            .map_err(|e| FetchError::Transport(format!("{}: {}", path.display(), e)))
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

// ============================================================================
// LOAD STATE
// ============================================================================

/// State of one document inside a view
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState<T> {
    Loading,
    /// Fetched; None when the document was null or empty
    Ready(Option<Arc<T>>),
    Failed(String),
}

impl<T> LoadState<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            LoadState::Ready(Some(doc)) => Some(doc.as_ref()),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoadState::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }
}

impl<T> Default for LoadState<T> {
    fn default() -> Self {
        LoadState::Loading
    }
}

/// Result of a fetch attempt as seen by the view
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Commit(LoadState<T>),
    /// The view went away while the fetch was in flight
    Discarded,
}

/// Decode a body. JSON `null` and `{}` mean "no data".
pub fn decode<T: DeserializeOwned>(resource: Resource, body: &[u8]) -> Result<Option<T>, FetchError> {
    let value: serde_json::Value = serde_json::from_slice(body).map_err(|e| FetchError::Decode {
        resource: resource.noun(),
        message: e.to_string(),
    })?;

    let empty = match &value {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty {
        return Ok(None);
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| FetchError::Decode {
            resource: resource.noun(),
            message: e.to_string(),
        })
}

/// Fetch and decode one document, honoring the token before commit
pub async fn load<T: DeserializeOwned>(
    source: &dyn SnapshotSource,
    resource: Resource,
    token: &CancelToken,
) -> Outcome<T> {
    tracing::info!(resource = resource.noun(), source = %source.describe(), "fetching snapshot");

    let result = match source.fetch_raw(resource).await {
        Ok(body) => decode::<T>(resource, &body),
        Err(e) => Err(e),
    };

    if token.is_cancelled() {
        tracing::debug!(resource = resource.noun(), "view torn down, discarding fetch result");
        return Outcome::Discarded;
    }

    match result {
        Ok(Some(doc)) => {
            tracing::info!(resource = resource.noun(), "snapshot loaded");
            Outcome::Commit(LoadState::Ready(Some(Arc::new(doc))))
        }
        Ok(None) => {
            tracing::warn!(resource = resource.noun(), "snapshot is empty");
            Outcome::Commit(LoadState::Ready(None))
        }
        Err(e) => {
            tracing::error!(resource = resource.noun(), error = %e, "snapshot fetch failed");
            Outcome::Commit(LoadState::Failed(e.to_string()))
        }
    }
}

pub async fn load_comparison(source: &dyn SnapshotSource, token: &CancelToken) -> Outcome<ComparisonDocument> {
    load(source, Resource::Comparison, token).await
}

pub async fn load_aggregate(source: &dyn SnapshotSource, token: &CancelToken) -> Outcome<AggregateDocument> {
    load(source, Resource::Aggregate, token).await
}

/// Non-2xx response as a fetch error. The text is the canonical reason for the
/// code; reqwest does not keep the phrase the server sent.
fn status_error(resource: Resource, status: reqwest::StatusCode) -> FetchError {
    FetchError::status(resource, status.as_u16(), status.canonical_reason().unwrap_or(""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const COMPARISON: &str = r#"{
        "metadata": {
            "old_baseline": "February 2024",
            "new_baseline": "February 2026",
            "source_url": "https://www.cbo.gov/data/budget-economic-data",
            "generated_at": "2026-02-13T00:00:00Z"
        },
        "parameters": {
            "individual_income_tax": {
                "label": "Individual income tax revenue",
                "unit": "currency-USD",
                "category": "revenue",
                "old": {"2025": 2520000000000},
                "new": {"2025": 2621342000000},
                "pct_change": {"2025": 4.02}
            }
        }
    }"#;

    /// In-memory source; can cancel a token mid-flight to simulate teardown
    struct StubSource {
        responses: HashMap<Resource, Result<Vec<u8>, FetchError>>,
        cancel_on_fetch: Mutex<Option<CancelToken>>,
    }

    impl StubSource {
        fn new() -> Self {
            Self {
                responses: HashMap::new(),
                cancel_on_fetch: Mutex::new(None),
            }
        }

        fn with(mut self, resource: Resource, response: Result<&str, FetchError>) -> Self {
            self.responses
                .insert(resource, response.map(|s| s.as_bytes().to_vec()));
            self
        }
    }

    #[async_trait]
    impl SnapshotSource for StubSource {
        async fn fetch_raw(&self, resource: Resource) -> Result<Vec<u8>, FetchError> {
            if let Some(token) = self.cancel_on_fetch.lock().unwrap().take() {
                token.cancel();
            }
            self.responses
                .get(&resource)
                .cloned()
                .unwrap_or_else(|| Err(FetchError::status(resource, 404, "Not Found")))
        }

        fn describe(&self) -> String {
            "stub".to_string()
        }
    }

    #[tokio::test]
    async fn test_successful_fetch_commits_document() {
        let source = StubSource::new().with(Resource::Comparison, Ok(COMPARISON));
        let token = CancelToken::new();

        match load_comparison(&source, &token).await {
            Outcome::Commit(state) => {
                let doc = state.data().unwrap();
                assert_eq!(doc.metadata.old_baseline, "February 2024");
                assert!(doc.parameters.contains_key("individual_income_tax"));
            }
            Outcome::Discarded => panic!("fetch should have committed"),
        }
    }

    #[tokio::test]
    async fn test_status_error_message() {
        let source = StubSource::new().with(
            Resource::Comparison,
            Err(FetchError::status(Resource::Comparison, 500, "Internal Server Error")),
        );

        let outcome = load_comparison(&source, &CancelToken::new()).await;
        assert_eq!(
            outcome,
            Outcome::Commit(LoadState::Failed(
                "Failed to fetch data: 500 Internal Server Error".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_aggregate_status_error_names_resource() {
        let source = StubSource::new();
        let outcome = load_aggregate(&source, &CancelToken::new()).await;
        assert_eq!(
            outcome,
            Outcome::Commit(LoadState::Failed(
                "Failed to fetch aggregate data: 404 Not Found".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_transport_error_is_verbatim() {
        let source = StubSource::new().with(
            Resource::Comparison,
            Err(FetchError::Transport("Network error".to_string())),
        );

        let outcome = load_comparison(&source, &CancelToken::new()).await;
        match outcome {
            Outcome::Commit(state) => assert_eq!(state.error(), Some("Network error")),
            Outcome::Discarded => panic!("fetch should have committed"),
        }
    }

    #[tokio::test]
    async fn test_null_document_is_no_data() {
        let source = StubSource::new().with(Resource::Comparison, Ok("null"));
        let outcome = load_comparison(&source, &CancelToken::new()).await;
        assert_eq!(outcome, Outcome::Commit(LoadState::Ready(None)));
    }

    #[tokio::test]
    async fn test_cancelled_during_fetch_is_discarded() {
        let token = CancelToken::new();
        let source = StubSource::new().with(Resource::Comparison, Ok(COMPARISON));
        *source.cancel_on_fetch.lock().unwrap() = Some(token.clone());

        let outcome = load_comparison(&source, &token).await;
        assert_eq!(outcome, Outcome::Discarded);
    }

    #[tokio::test]
    async fn test_cancelled_failure_is_discarded_too() {
        let token = CancelToken::new();
        token.cancel();
        let source = StubSource::new();

        let outcome = load_aggregate(&source, &token).await;
        assert_eq!(outcome, Outcome::Discarded);
    }

    #[tokio::test]
    async fn test_file_source_reads_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data")).unwrap();
        std::fs::write(dir.path().join(Resource::Comparison.path()), COMPARISON).unwrap();

        let source = FileSource::new(dir.path());
        let outcome = load_comparison(&source, &CancelToken::new()).await;
        match outcome {
            Outcome::Commit(state) => assert!(state.data().is_some()),
            Outcome::Discarded => panic!("fetch should have committed"),
        }

        let missing = load_aggregate(&source, &CancelToken::new()).await;
        match missing {
            Outcome::Commit(LoadState::Failed(message)) => {
                assert!(message.contains("aggregate_impacts.json"))
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode::<ComparisonDocument>(Resource::Comparison, b"not json").unwrap_err();
        assert!(matches!(err, FetchError::Decode { resource: "data", .. }));
    }

    #[test]
    fn test_http_url_join() {
        let source = HttpSource::new("http://localhost:3000/");
        assert_eq!(
            source.url_for(Resource::Aggregate),
            "http://localhost:3000/data/aggregate_impacts.json"
        );
    }

    #[test]
    fn test_status_error_uses_canonical_reason() {
        let err = status_error(Resource::Comparison, reqwest::StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Failed to fetch data: 404 Not Found");

        let err = status_error(Resource::Aggregate, reqwest::StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "Failed to fetch aggregate data: 503 Service Unavailable");

        let odd = reqwest::StatusCode::from_u16(599).unwrap();
        assert_eq!(
            status_error(Resource::Comparison, odd).to_string(),
            "Failed to fetch data: 599 "
        );
    }
}
