use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use search_core::{DocId, SearchService};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize {
    10
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<HitResponse>,
}

#[derive(Serialize)]
pub struct HitResponse {
    #[serde(rename = "docId")]
    pub doc_id: DocId,
    pub score: f64,
    pub snippet: String,
}

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SearchService>,
    pub index_dir: PathBuf,
    pub admin_token: Option<String>,
}

pub fn build_app(index_dir: String) -> Result<Router> {
    // Load the committed index at startup.
    let service = SearchService::new();
    service.load(Path::new(&index_dir))?;
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let state = AppState {
        service: Arc::new(service),
        index_dir: PathBuf::from(index_dir),
        admin_token,
    };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods(Any)
                    .allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/reload", post(reload_handler))
        .with_state(state)
        .layer(cors);
    Ok(app)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let hits = state.service.search_with_snippets(&params.q);
    let total_hits = hits.len();

    let k = params.k.clamp(1, 100);
    let results = hits
        .into_iter()
        .take(k)
        .map(|h| HitResponse {
            doc_id: h.doc_id,
            score: h.score,
            snippet: h.snippet,
        })
        .collect();

    Json(SearchResponse {
        query: params.q,
        took_s: start.elapsed().as_secs_f64(),
        total_hits,
        results,
    })
}

/// Hot reload: rebuild the in-memory image from the index directory. The
/// service parses outside its writer lock, so live searches keep running
/// until the final swap.
async fn reload_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    state
        .service
        .load(&state.index_dir)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    tracing::info!(index_dir = %state.index_dir.display(), "index reloaded");
    Ok(Json(serde_json::json!({ "reloaded": true })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers
        .get("X-ADMIN-TOKEN")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
