//! Things Server
//!
//! A small HTTP service around one SQLite table of (id, name) records.
//! Serves a nonce-protected HTML form and list view alongside a
//! capability-gated JSON API, both backed by the same cached store.

mod handlers;
mod services;
mod storage;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use things_core::Capability;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use services::{AuthService, NonceService, ThingStore};
use storage::{Database, MemoryCache};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ThingStore>,
    pub nonces: Arc<NonceService>,
    pub auth: Arc<AuthService>,
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("[FATAL] Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!("Starting things-server v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run_server().await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_server() -> Result<()> {
    let config = load_config().context("Failed to load configuration")?;
    info!(
        "Config loaded: bind={}, db={}",
        config.bind_address, config.database_path
    );

    let cache = Arc::new(MemoryCache::new());

    let db = Arc::new(
        Database::new(&config.database_path)
            .await
            .context("Failed to initialize database")?,
    );
    db.ensure_schema(&cache)
        .await
        .context("Failed to initialize schema")?;
    info!("SQLite database ready at: {}", config.database_path);

    let store = Arc::new(ThingStore::new(db, cache.clone()));
    let nonces = Arc::new(NonceService::new(cache));
    let auth = Arc::new(AuthService::new(config.auth_secret));

    // There is no login flow; log a full-capability token at startup so
    // the JSON API is reachable without a separate minting tool.
    let token = auth.issue_token(&[Capability::Edit, Capability::Read])?;
    info!("API token (edit+read): {}", token);

    let state = AppState {
        store,
        nonces,
        auth,
    };
    let app = app(state);

    info!("Server listening on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route(
            "/",
            get(handlers::pages::form_page).post(handlers::pages::form_submit),
        )
        .route("/list", get(handlers::pages::list_page))
        .route("/health", get(handlers::health))
        .nest("/api/v1", api_routes())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/insert", post(handlers::api::insert))
        .route("/select", get(handlers::api::select))
}

#[derive(Debug, Clone)]
struct Config {
    bind_address: SocketAddr,
    database_path: String,
    auth_secret: String,
}

fn load_config() -> Result<Config> {
    let data_dir = std::env::var("DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data"));

    let database_path = std::env::var("DATABASE_PATH")
        .unwrap_or_else(|_| data_dir.join("things.db").to_string_lossy().to_string());

    let bind_address: SocketAddr = std::env::var("BIND_ADDRESS")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()
        .context("Failed to parse bind address")?;

    let auth_secret = std::env::var("AUTH_SECRET").unwrap_or_else(|_| {
        warn!("AUTH_SECRET not set, using default (insecure for production)");
        "change-me-in-production".to_string()
    });

    Ok(Config {
        bind_address,
        database_path,
        auth_secret,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

    async fn test_state() -> AppState {
        let cache = Arc::new(MemoryCache::new());
        let db = Arc::new(Database::in_memory().await.unwrap());
        db.ensure_schema(&cache).await.unwrap();

        AppState {
            store: Arc::new(ThingStore::new(db, cache.clone())),
            nonces: Arc::new(NonceService::new(cache)),
            auth: Arc::new(AuthService::new("test-secret".to_string())),
        }
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn form_page_renders_form_with_nonce() {
        let state = test_state().await;
        let app = app(state);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("name=\"thing_name\""));
        assert!(body.contains("name=\"nonce\""));
    }

    #[tokio::test]
    async fn form_submit_with_valid_nonce_inserts() {
        let state = test_state().await;
        let app = app(state.clone());

        let nonce = state.nonces.issue("thing-form");
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header(header::CONTENT_TYPE, FORM_URLENCODED)
                    .body(Body::from(format!("thing_name=Widget&nonce={nonce}")))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(!body.contains("Nonce verification failed"));
        assert!(body.contains("name=\"thing_name\""));

        let all = state.store.list(None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Widget");
    }

    #[tokio::test]
    async fn form_submit_with_bad_nonce_never_inserts() {
        let state = test_state().await;
        let app = app(state.clone());

        for body in ["thing_name=Widget&nonce=deadbeef", "thing_name=Widget"] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/")
                        .header(header::CONTENT_TYPE, FORM_URLENCODED)
                        .body(Body::from(body))
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert!(body_string(response)
                .await
                .contains("Nonce verification failed!"));
        }

        assert!(state.store.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_page_without_search_needs_no_nonce() {
        let state = test_state().await;
        state.store.insert("Widget").await.unwrap();
        let app = app(state);

        let response = app
            .oneshot(Request::builder().uri("/list").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("<td>Widget</td>"));
    }

    #[tokio::test]
    async fn list_page_search_requires_valid_nonce() {
        let state = test_state().await;
        state.store.insert("Widget").await.unwrap();
        state.store.insert("Gadget").await.unwrap();
        let app = app(state.clone());

        let nonce = state.nonces.issue("thing-form");
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/list?search=Wid&nonce={nonce}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_string(response).await;
        assert!(body.contains("<td>Widget</td>"));
        assert!(!body.contains("<td>Gadget</td>"));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/list?search=Wid&nonce=deadbeef")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_string(response).await;
        assert!(body.contains("Nonce verification failed for search form!"));
        assert!(!body.contains("<td>Widget</td>"));
    }

    #[tokio::test]
    async fn list_page_escapes_names() {
        let state = test_state().await;
        state.store.insert("<script>alert(1)</script>").await.unwrap();
        let app = app(state);

        let response = app
            .oneshot(Request::builder().uri("/list").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = body_string(response).await;
        assert!(body.contains("&lt;script&gt;"));
        assert!(!body.contains("<script>"));
    }

    #[tokio::test]
    async fn api_insert_requires_edit_capability() {
        let state = test_state().await;
        let app = app(state.clone());

        // No token at all.
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/insert")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"name": "Widget"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // Read-only token.
        let read_token = state.auth.issue_token(&[Capability::Read]).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/insert")
                    .header(header::AUTHORIZATION, format!("Bearer {read_token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"name": "Widget"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        assert!(state.store.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn api_insert_then_select_round_trip() {
        let state = test_state().await;
        let app = app(state.clone());

        let edit_token = state.auth.issue_token(&[Capability::Edit]).unwrap();
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/insert")
                    .header(header::AUTHORIZATION, format!("Bearer {edit_token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"name": "Widget"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response)
            .await
            .contains("Data inserted successfully."));

        let read_token = state.auth.issue_token(&[Capability::Read]).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/select")
                    .header(header::AUTHORIZATION, format!("Bearer {read_token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("Widget"));
    }

    #[tokio::test]
    async fn api_insert_without_name_is_acknowledged() {
        let state = test_state().await;
        let app = app(state.clone());

        let edit_token = state.auth.issue_token(&[Capability::Edit]).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/insert")
                    .header(header::AUTHORIZATION, format!("Bearer {edit_token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("Name not provided."));
        assert!(state.store.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn api_select_requires_read_and_ignores_filters() {
        let state = test_state().await;
        state.store.insert("Widget").await.unwrap();
        state.store.insert("Gadget").await.unwrap();
        let app = app(state.clone());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/select")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let read_token = state.auth.issue_token(&[Capability::Read]).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/select?search=Wid")
                    .header(header::AUTHORIZATION, format!("Bearer {read_token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_string(response).await;
        assert!(body.contains("Widget"));
        assert!(body.contains("Gadget"));
    }

    #[tokio::test]
    async fn health_endpoint_responds() {
        let state = test_state().await;
        let app = app(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("ok"));
    }
}
