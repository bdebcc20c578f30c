use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use dompet_core::{DateRange, Transaction, TransactionSummary};
use dompet_ingest::{IngestOutcome, IngestPipeline, SourceFile, TextExtractor, TransactionExtractor};
use dompet_storage::JsonStore;
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::ApiError;

pub struct AppState<T: TextExtractor, L: TransactionExtractor> {
    pub pipeline: Arc<IngestPipeline<T, L>>,
    pub store: Arc<JsonStore>,
}

impl<T: TextExtractor, L: TransactionExtractor> AppState<T, L> {
    pub fn new(pipeline: IngestPipeline<T, L>) -> Self {
        let store = pipeline.store().clone();
        Self {
            pipeline: Arc::new(pipeline),
            store,
        }
    }
}

// Derived Clone would demand T: Clone and L: Clone.
impl<T: TextExtractor, L: TransactionExtractor> Clone for AppState<T, L> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            store: self.store.clone(),
        }
    }
}

pub fn build_router<T, L>(state: AppState<T, L>, config: &ServerConfig) -> Router
where
    T: TextExtractor + 'static,
    L: TransactionExtractor + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route("/upload", post(upload::<T, L>))
        .route("/transactions", get(list_transactions::<T, L>))
        .route("/summary", get(summary::<T, L>))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(allowed))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Deserialize)]
struct RangeQuery {
    start: Option<String>,
    end: Option<String>,
}

impl RangeQuery {
    fn to_range(&self) -> Result<DateRange, ApiError> {
        DateRange::parse(self.start.as_deref(), self.end.as_deref()).map_err(ApiError::BadRequest)
    }
}

#[derive(Serialize)]
struct TransactionsResponse {
    transactions: Vec<Transaction>,
    total: usize,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Accepts repeated `files` fields. Each one is spooled to a temp file that
/// lives until the batch has been ingested.
async fn upload<T, L>(
    State(state): State<AppState<T, L>>,
    mut multipart: Multipart,
) -> Result<Json<IngestOutcome>, ApiError>
where
    T: TextExtractor + 'static,
    L: TransactionExtractor + 'static,
{
    let mut spooled = Vec::new();
    let mut sources = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("File part is missing a filename".to_string()))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read {filename}: {e}")))?;

        let tmp = tempfile::Builder::new()
            .prefix("dompet-upload-")
            .suffix(".pdf")
            .tempfile()
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        tokio::fs::write(tmp.path(), &data)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        info!(file = %filename, size = data.len(), "Received upload");
        sources.push(SourceFile::new(filename, tmp.path()));
        spooled.push(tmp);
    }

    let outcome = state.pipeline.ingest(&sources).await?;
    drop(spooled);
    Ok(Json(outcome))
}

async fn list_transactions<T, L>(
    State(state): State<AppState<T, L>>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<TransactionsResponse>, ApiError>
where
    T: TextExtractor + 'static,
    L: TransactionExtractor + 'static,
{
    let range = query.to_range()?;
    let transactions = state.store.query_transactions(&range).await?;
    let total = transactions.len();
    Ok(Json(TransactionsResponse {
        transactions,
        total,
    }))
}

async fn summary<T, L>(
    State(state): State<AppState<T, L>>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<TransactionSummary>, ApiError>
where
    T: TextExtractor + 'static,
    L: TransactionExtractor + 'static,
{
    let range = query.to_range()?;
    Ok(Json(state.store.summary(&range).await?))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use dompet_core::CandidateTransaction;
    use dompet_ingest::{ExtractError, IngestSettings, MockTransactionExtractor};
    use dompet_storage::CorruptionPolicy;
    use serde_json::Value;
    use std::path::Path;
    use tower::ServiceExt;

    /// Upload temp files get random names, so the text is the same for all.
    struct FixedText;

    impl TextExtractor for FixedText {
        fn extract_text(&self, _path: &Path) -> Result<String, ExtractError> {
            Ok("statement".to_string())
        }
    }

    fn candidate(date: &str, description: &str, amount: f64, category: &str) -> CandidateTransaction {
        CandidateTransaction {
            date: date.to_string(),
            description: description.to_string(),
            amount,
            merchant_canonical: description.to_string(),
            category: category.to_string(),
            confidence: 0.9,
        }
    }

    fn router(dir: &tempfile::TempDir, llm: MockTransactionExtractor) -> Router {
        let store = Arc::new(JsonStore::new(
            dir.path().join("db.json"),
            CorruptionPolicy::FailClosed,
        ));
        let pipeline = IngestPipeline::new(store, FixedText, llm, IngestSettings::default());
        build_router(AppState::new(pipeline), &ServerConfig::default())
    }

    fn multipart(files: &[&str]) -> Request<Body> {
        let boundary = "dompet-test-boundary";
        let mut body = Vec::new();
        for name in files {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: application/pdf\r\n\r\n%PDF-1.4 fake\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let dir = tempfile::tempdir().unwrap();
        let resp = router(&dir, MockTransactionExtractor::new())
            .oneshot(get("/health"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["status"], "ok");
    }

    #[tokio::test]
    async fn upload_then_list_and_summarise() {
        let dir = tempfile::tempdir().unwrap();
        let llm = MockTransactionExtractor::new()
            .with(
                "jan.pdf",
                vec![
                    candidate("2024-01-25", "PT MAJU salary", 8_000_000.0, "Income"),
                    candidate("2024-01-10", "KFC Senayan", -75_000.0, "Food & Dining"),
                ],
            )
            .with(
                "feb.pdf",
                vec![candidate("2024-02-03", "PLN prepaid", -250_000.0, "Bills & Utilities")],
            );
        let app = router(&dir, llm);

        let resp = app.clone().oneshot(multipart(&["jan.pdf", "feb.pdf"])).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let outcome = json_body(resp).await;
        assert_eq!(outcome["success"], true);
        assert_eq!(outcome["parsed_count"], 3);
        assert_eq!(outcome["import_id"], "imp_001");

        let resp = app.clone().oneshot(get("/transactions")).await.unwrap();
        let listed = json_body(resp).await;
        assert_eq!(listed["total"], 3);
        assert_eq!(listed["transactions"][0]["date"], "2024-02-03");
        assert_eq!(listed["transactions"][0]["source"]["file"], "feb.pdf");

        let resp = app
            .clone()
            .oneshot(get("/transactions?start=2024-01-01&end=2024-01-31"))
            .await
            .unwrap();
        assert_eq!(json_body(resp).await["total"], 2);

        let resp = app.oneshot(get("/summary")).await.unwrap();
        let summary = json_body(resp).await;
        assert_eq!(summary["total_income"], 8_000_000.0);
        assert_eq!(summary["total_spend"], 325_000.0);
        assert_eq!(summary["spend_by_category"]["Food & Dining"], 75_000.0);
    }

    #[tokio::test]
    async fn upload_rejects_non_pdf_with_400() {
        let dir = tempfile::tempdir().unwrap();
        let resp = router(&dir, MockTransactionExtractor::new())
            .oneshot(multipart(&["statement.csv"]))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = json_body(resp).await;
        assert!(body["error"].as_str().unwrap().contains("statement.csv"));
    }

    #[tokio::test]
    async fn upload_without_files_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let resp = router(&dir, MockTransactionExtractor::new())
            .oneshot(multipart(&[]))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn extractor_failure_is_500_and_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let llm = MockTransactionExtractor::new()
            .with("a.pdf", vec![candidate("2024-01-01", "KFC", -1.0, "Food & Dining")])
            .failing("b.pdf", "upstream timeout");
        let app = router(&dir, llm);

        let resp = app.clone().oneshot(multipart(&["a.pdf", "b.pdf"])).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json_body(resp).await["error"]
            .as_str()
            .unwrap()
            .contains("upstream timeout"));

        let resp = app.oneshot(get("/transactions")).await.unwrap();
        assert_eq!(json_body(resp).await["total"], 0);
    }

    #[tokio::test]
    async fn bad_date_query_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(&dir, MockTransactionExtractor::new());
        for uri in ["/transactions?start=2024-13-01", "/summary?end=01/02/2024"] {
            let resp = app.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn cors_allows_configured_origin_only() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(&dir, MockTransactionExtractor::new());

        let req = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:3000"
        );

        let req = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://evil.test")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }
}
