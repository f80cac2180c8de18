//! `gantry serve` -- the generated REST+RPC surface.
//!
//! Loads resource specifications (and their behavioral contracts), opens
//! the store registry, and binds one set of generic CRUD routes per
//! resource plus a trigger route for contract-governed resources. No
//! resource-specific handler code exists: every handler is a thin
//! adapter parameterized by the resource's [`state::ResourceContext`].
//!
//! Routes per resource `R` at its base path:
//! - GET    /R            - list with pagination envelope and `q` search
//! - GET    /R/{id}       - fetch one record
//! - POST   /R            - create (201 + Location)
//! - PATCH  /R/{id}       - shallow-merge update
//! - DELETE /R/{id}       - delete (204)
//! - POST   /R/{id}/{trigger} - behavioral contract trigger (RPC)
//!
//! Plus GET /health and a JSON 404 fallback. All responses use
//! Content-Type: application/json.

mod handlers;
mod state;

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};

use gantry_core::{load_dir, ResolutionPolicy, SchemaValidator};
use gantry_storage::StoreRegistry;

use self::state::ResourceContext;

/// Maximum request body size: 1 MB.
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> axum::response::Response {
    (status, Json(serde_json::json!({"error": message}))).into_response()
}

/// GET /health
async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "gantry_version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

/// Fallback handler for unmatched routes.
async fn handle_not_found() -> axum::response::Response {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// Bind the generic route set for every loaded specification.
fn build_router(contexts: &[Arc<ResourceContext>]) -> Router {
    let mut router = Router::new().route("/health", get(handle_health));

    for ctx in contexts {
        let base = ctx.spec.base_resource_path.clone();
        let by_id = format!("{}/{{id}}", base);

        let list = {
            let ctx = Arc::clone(ctx);
            move |query| handlers::list_records(ctx.clone(), query)
        };
        let create = {
            let ctx = Arc::clone(ctx);
            move |body| handlers::create_record(ctx.clone(), body)
        };
        let fetch = {
            let ctx = Arc::clone(ctx);
            move |path| handlers::get_record(ctx.clone(), path)
        };
        let update = {
            let ctx = Arc::clone(ctx);
            move |path, body| handlers::update_record(ctx.clone(), path, body)
        };
        let remove = {
            let ctx = Arc::clone(ctx);
            move |path| handlers::delete_record(ctx.clone(), path)
        };

        router = router
            .route(&base, get(list).post(create))
            .route(&by_id, get(fetch).patch(update).delete(remove));

        if ctx.spec.contract.is_some() {
            let trigger = {
                let ctx = Arc::clone(ctx);
                move |path, body| handlers::fire_trigger(ctx.clone(), path, body)
            };
            router = router.route(&format!("{}/{{id}}/{{trigger}}", base), post(trigger));
        }

        tracing::info!(
            resource = %ctx.spec.name,
            base = %base,
            contract = ctx.spec.contract.is_some(),
            "routes bound"
        );
    }

    router.fallback(handle_not_found)
}

/// Build the per-resource contexts: compiled validators + store handles.
fn build_contexts(
    spec_dir: &Path,
    registry: &StoreRegistry,
    policy: ResolutionPolicy,
) -> Result<Vec<Arc<ResourceContext>>, Box<dyn Error>> {
    let specs = load_dir(spec_dir, policy)?;
    if specs.is_empty() {
        return Err(format!("no specification files found in {}", spec_dir.display()).into());
    }

    let mut contexts = Vec::with_capacity(specs.len());
    for spec in specs {
        let create_validator = spec
            .request_schema_for("POST")
            .map(|schema| SchemaValidator::compile(&spec.name, schema))
            .transpose()?;
        let update_validator = spec
            .request_schema_for("PATCH")
            .or_else(|| spec.request_schema_for("POST"))
            .map(|schema| SchemaValidator::compile(&spec.name, schema))
            .transpose()?;
        let store = registry.store(&spec.name);
        contexts.push(Arc::new(ResourceContext {
            spec,
            store,
            create_validator,
            update_validator,
            rpc_lock: parking_lot::Mutex::new(()),
        }));
    }
    Ok(contexts)
}

/// Load specifications, open the registry, and serve until Ctrl-C.
pub(crate) async fn start_server(
    port: u16,
    spec_dir: &Path,
    db_path: &Path,
    seed_dir: Option<&Path>,
    policy: ResolutionPolicy,
) -> Result<(), Box<dyn Error>> {
    let registry = StoreRegistry::open(db_path)?;
    let contexts = build_contexts(spec_dir, &registry, policy)?;

    if let Some(seed_dir) = seed_dir {
        for ctx in &contexts {
            crate::seed::import(&ctx.store, seed_dir)?;
        }
    }

    // CORS: permissive for local dev.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(Any);

    let app = build_router(&contexts)
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE));

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, resources = contexts.len(), "gantry listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down");
    registry.close_all();
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("failed to install Ctrl+C handler");
    }
}
