//! Documentation of an image faceoff platform.
//!
//! Visitors get two images, pick the one they prefer, and both ratings move by Elo.
//!
//!
//!
//! # Request Flow
//! - `GET /comparison` samples two distinct images from the store
//! - `POST /vote` with `{"winnerId", "loserId"}` validates the ids, checks the rate limiter,
//!   reads both current ratings, runs Elo and writes both ratings in one atomic step
//! - `GET /leaderboard?limit=N` lists the top and bottom rated images
//! - Nothing about a comparison round is stored, a vote is judged only by the ids it carries
//!
//!
//!
//! # Preventing Vote Spam
//!
//! **Goal**: keep a single client from hammering `/vote`.
//!
//! - Sliding window per client IP, plus a second one per `session_id` cookie when present
//! - A vote has to pass both, IP is checked first, and only counts against either once it passes
//! - The IP is the socket peer. Set `RUST_TRUST_PROXY_HEADERS=true` behind a reverse proxy to
//!   key on the `X-Forwarded-For` hop the proxy appended instead
//! - Invalid payloads are rejected before the limiter, so they cost nothing
//! - Throttled votes get a 429 with `Retry-After`
//! - Buckets live in process memory, see [`limiter`]
//!
//!
//!
//! # Notes
//!
//! ## Lost updates
//! Ratings are read then written without a version check. Two votes on the same image landing
//! together can both start from the old rating and one delta is lost. Acceptable for a
//! popularity nudge; a version field with retry-on-conflict is the fix if it ever is not.
//!
//! ## Configuration
//! Everything comes from `RUST_*` environment variables, see [`config::Config::load`].
//! `RUST_LOG` controls log output.
//!
//!
//!
//! # Setup
//!
//! Run against a local Redis.
//! ```sh
//! RUST_LOG=info cargo run -p faceoff
//! ```
//!
//! Run without Redis, ratings vanish on restart.
//! ```sh
//! RUST_STORE=memory cargo run -p faceoff
//! ```
//!
//! Import a folder of images.
//! ```sh
//! cargo run -p process -- ./images --base-url /images/
//! ```
use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod elo;
pub mod error;
pub mod identity;
pub mod limiter;
pub mod routes;
pub mod sampler;
pub mod state;
pub mod utils;
pub mod votes;

use error::StartupError;
use routes::{comparison_handler, health_handler, leaderboard_handler, votes_handler};
use state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/comparison", get(comparison_handler))
        .route("/vote", post(votes_handler))
        .route("/leaderboard", get(leaderboard_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> Result<(), StartupError> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    let app = app(state);

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutting down...");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
