use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use quizbank_api::auth::{self, AppState, AppStateInner};
use quizbank_api::middleware::require_auth;
use quizbank_api::records;
use quizbank_api::storage::{AudioStore, DEFAULT_MAX_UPLOAD_BYTES};
use quizbank_api::token::TokenService;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizbank=debug,tower_http=debug".into()),
        )
        .init();

    // Config — the signing secret is fatal if unset, not a runtime error.
    let jwt_secret = std::env::var("QUIZBANK_JWT_SECRET").unwrap_or_default();
    if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
        eprintln!("FATAL: QUIZBANK_JWT_SECRET is unset or still a placeholder.");
        eprintln!("       Set it in your .env file and restart.");
        std::process::exit(1);
    }

    let db_path = std::env::var("QUIZBANK_DB_PATH").unwrap_or_else(|_| "quizbank.db".into());
    let upload_dir: PathBuf = std::env::var("QUIZBANK_UPLOAD_DIR")
        .unwrap_or_else(|_| "./uploads".into())
        .into();
    let max_upload_bytes: usize = std::env::var("QUIZBANK_MAX_UPLOAD_BYTES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
    let host = std::env::var("QUIZBANK_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("QUIZBANK_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Shared state
    let db = quizbank_db::Database::open(&PathBuf::from(&db_path))?;
    let audio = AudioStore::new(upload_dir, max_upload_bytes).await?;
    let state: AppState = Arc::new(AppStateInner {
        db,
        tokens: TokenService::new(&jwt_secret),
        audio,
    });

    // Routes — reads are public, mutations pass through the auth gate.
    let public_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/tests", get(records::list_tests))
        .route("/api/tests/{id}", get(records::get_test))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/auth/change-password", post(auth::change_password_handler))
        .route("/api/auth/me", get(auth::me))
        .route("/api/tests", post(records::create_test))
        .route("/api/tests/{id}", put(records::update_test))
        .route("/api/tests/{id}", delete(records::delete_test))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        // Leave headroom above the asset ceiling for the multipart framing.
        .layer(DefaultBodyLimit::max(max_upload_bytes + 64 * 1024))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("quizbank server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
