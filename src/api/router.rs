//! HTTP API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::pipeline::extraction::Slot;

/// Headroom for multipart boundaries and part headers.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Build the API router.
///
/// The request body limit covers one file per slot plus multipart overhead;
/// the per-file bound is enforced by the upload handler.
pub fn api_router(ctx: ApiContext) -> Router {
    let body_limit = ctx
        .max_upload_bytes
        .saturating_mul(Slot::ALL.len())
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/prescription/parse", post(endpoints::prescriptions::parse))
        .with_state(ctx);

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT]),
        )
}
