//! Generic CRUD + trigger handlers.
//!
//! Each handler is a thin adapter: extract parameters, validate the body
//! against the resource's compiled schema, run the store (and, for
//! triggers, the state machine engine) on the blocking pool, and map the
//! outcome to an HTTP status. Store-layer outcomes map as: 200
//! read/update, 201+Location create, 204 delete, 404 unknown id, 400
//! malformed body or query, 409 conflict, 422 schema validation failure,
//! 500 unexpected.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use gantry_core::FieldError;
use gantry_engine::{fire, EngineError, TriggerContext};
use gantry_storage::{PageRequest, StorageError};

use super::json_error;
use super::state::ResourceContext;

/// 422 with the field-level validation detail.
fn validation_failure(errors: Vec<FieldError>) -> Response {
    (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "errors": errors }))).into_response()
}

/// Map a store-layer error: duplicate ids are client conflicts,
/// everything else is unexpected.
fn storage_error(e: StorageError) -> Response {
    match e {
        StorageError::DuplicateId { .. } => json_error(StatusCode::CONFLICT, &e.to_string()),
        other => {
            tracing::error!(error = %other, "storage operation failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage operation failed")
        }
    }
}

fn join_error() -> Response {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "task join error")
}

/// Accept the body only if it parsed as a JSON object (400 otherwise).
fn require_object(body: Result<Json<Value>, JsonRejection>) -> Result<Value, Response> {
    let Json(body) = body.map_err(|e| json_error(StatusCode::BAD_REQUEST, &e.to_string()))?;
    if body.is_object() {
        Ok(body)
    } else {
        Err(json_error(
            StatusCode::BAD_REQUEST,
            "request body must be a JSON object",
        ))
    }
}

fn u64_param(
    params: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<u64, Response> {
    match params.get(name) {
        None => Ok(default),
        Some(raw) => raw.parse::<u64>().map_err(|_| {
            json_error(
                StatusCode::BAD_REQUEST,
                &format!("query parameter '{}' must be a non-negative integer", name),
            )
        }),
    }
}

/// GET /{base} -- list with the pagination envelope and `q` search.
pub(crate) async fn list_records(
    ctx: Arc<ResourceContext>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let pagination = ctx.spec.pagination;
    let limit = match u64_param(&params, "limit", pagination.limit_default) {
        Ok(limit) => limit.min(pagination.limit_max),
        Err(response) => return response,
    };
    let offset = match u64_param(&params, "offset", pagination.offset_default) {
        Ok(offset) => offset,
        Err(response) => return response,
    };
    let conditions = match params.get("q") {
        Some(raw) => match gantry_query::parse(raw) {
            Ok(conditions) => conditions,
            Err(e) => return json_error(StatusCode::BAD_REQUEST, &e.to_string()),
        },
        None => Vec::new(),
    };

    let store = ctx.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        store.find_all(
            |record| gantry_query::matches(record, &conditions),
            PageRequest { limit, offset },
        )
    })
    .await;

    match result {
        Ok(Ok(page)) => {
            let has_next = offset + (page.items.len() as u64) < page.total;
            let envelope = json!({
                "items": page.items,
                "total": page.total,
                "limit": limit,
                "offset": offset,
                "hasNext": has_next,
            });
            (StatusCode::OK, Json(envelope)).into_response()
        }
        Ok(Err(e)) => storage_error(e),
        Err(_) => join_error(),
    }
}

/// GET /{base}/{id}
pub(crate) async fn get_record(ctx: Arc<ResourceContext>, Path(id): Path<String>) -> Response {
    let store = ctx.store.clone();
    let result = tokio::task::spawn_blocking(move || store.find_by_id(&id)).await;
    match result {
        Ok(Ok(Some(record))) => (StatusCode::OK, Json(record)).into_response(),
        Ok(Ok(None)) => json_error(StatusCode::NOT_FOUND, "record not found"),
        Ok(Err(e)) => storage_error(e),
        Err(_) => join_error(),
    }
}

/// POST /{base} -- validate, stamp, insert. 201 with a Location header.
pub(crate) async fn create_record(
    ctx: Arc<ResourceContext>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let mut body = match require_object(body) {
        Ok(body) => body,
        Err(response) => return response,
    };
    if let Some(validator) = &ctx.create_validator {
        if let Err(errors) = validator.validate(&body) {
            return validation_failure(errors);
        }
    }
    // Contract-governed records enter the machine at the initial state.
    if let Some(contract) = &ctx.spec.contract {
        if body.get("status").is_none() {
            body["status"] = Value::String(contract.initial_state.clone());
        }
    }

    let store = ctx.store.clone();
    let result = tokio::task::spawn_blocking(move || store.insert(body)).await;
    match result {
        Ok(Ok(record)) => {
            let id = record["id"].as_str().unwrap_or_default();
            let location = format!("{}/{}", ctx.spec.base_resource_path, id);
            (
                StatusCode::CREATED,
                [(header::LOCATION, location)],
                Json(record.clone()),
            )
                .into_response()
        }
        Ok(Err(e)) => storage_error(e),
        Err(_) => join_error(),
    }
}

/// PATCH /{base}/{id} -- validate the partial, shallow-merge it in.
pub(crate) async fn update_record(
    ctx: Arc<ResourceContext>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body = match require_object(body) {
        Ok(body) => body,
        Err(response) => return response,
    };
    if let Some(validator) = &ctx.update_validator {
        if let Err(errors) = validator.validate(&body) {
            return validation_failure(errors);
        }
    }

    let store = ctx.store.clone();
    let result = tokio::task::spawn_blocking(move || store.update(&id, &body)).await;
    match result {
        Ok(Ok(Some(record))) => (StatusCode::OK, Json(record)).into_response(),
        Ok(Ok(None)) => json_error(StatusCode::NOT_FOUND, "record not found"),
        Ok(Err(e)) => storage_error(e),
        Err(_) => join_error(),
    }
}

/// DELETE /{base}/{id} -- idempotent at the store, 404 over HTTP.
pub(crate) async fn delete_record(ctx: Arc<ResourceContext>, Path(id): Path<String>) -> Response {
    let store = ctx.store.clone();
    let result = tokio::task::spawn_blocking(move || store.remove(&id)).await;
    match result {
        Ok(Ok(true)) => StatusCode::NO_CONTENT.into_response(),
        Ok(Ok(false)) => json_error(StatusCode::NOT_FOUND, "record not found"),
        Ok(Err(e)) => storage_error(e),
        Err(_) => join_error(),
    }
}

/// What a trigger call produced, before HTTP mapping.
enum TriggerReply {
    NotFound,
    Rejected(EngineError),
    Updated(Value),
}

/// POST /{base}/{id}/{trigger} -- run the state machine and persist.
///
/// The read-evaluate-persist cycle runs under the resource's RPC lock so
/// two concurrent trigger calls on the same record cannot race between
/// guard evaluation and persistence.
pub(crate) async fn fire_trigger(
    ctx: Arc<ResourceContext>,
    Path((id, trigger)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let caller = match body {
        Ok(Json(body)) if body.is_object() => body,
        Ok(_) => {
            return json_error(StatusCode::BAD_REQUEST, "request body must be a JSON object")
        }
        // Triggers may be fired without a body; the caller context is
        // empty then. A body that was sent but does not parse is a
        // client error and must not reach the state machine.
        Err(JsonRejection::MissingJsonContentType(_)) => json!({}),
        Err(rejection) => return json_error(StatusCode::BAD_REQUEST, &rejection.to_string()),
    };

    let worker = Arc::clone(&ctx);
    let result = tokio::task::spawn_blocking(move || -> Result<TriggerReply, StorageError> {
        let Some(contract) = &worker.spec.contract else {
            return Ok(TriggerReply::NotFound);
        };
        let _serialized = worker.rpc_lock.lock();

        let Some(record) = worker.store.find_by_id(&id)? else {
            return Ok(TriggerReply::NotFound);
        };
        let outcome = match fire(contract, &trigger, record, &TriggerContext::new(caller)) {
            Ok(outcome) => outcome,
            Err(e) => return Ok(TriggerReply::Rejected(e)),
        };
        tracing::debug!(
            resource = %worker.spec.name,
            %trigger,
            from = %outcome.from,
            to = %outcome.to,
            "transition applied"
        );
        match worker.store.update(&id, &outcome.record)? {
            Some(updated) => Ok(TriggerReply::Updated(updated)),
            None => Ok(TriggerReply::NotFound),
        }
    })
    .await;

    match result {
        Ok(Ok(TriggerReply::Updated(record))) => (StatusCode::OK, Json(record)).into_response(),
        Ok(Ok(TriggerReply::NotFound)) => json_error(StatusCode::NOT_FOUND, "record not found"),
        Ok(Ok(TriggerReply::Rejected(e))) => trigger_rejection(e),
        Ok(Err(e)) => storage_error(e),
        Err(_) => join_error(),
    }
}

/// Map engine rejections to the RPC error contract: 404 for trigger
/// typos, 409 for invalid-state calls and guard failures (with the
/// failing guard's name and reason), 500 for contract defects.
fn trigger_rejection(e: EngineError) -> Response {
    match e {
        EngineError::UnknownTrigger { .. } => json_error(StatusCode::NOT_FOUND, &e.to_string()),
        EngineError::WrongState { .. } => json_error(StatusCode::CONFLICT, &e.to_string()),
        EngineError::GuardFailed { guard, reason } => (
            StatusCode::CONFLICT,
            Json(json!({ "failedGuard": guard, "reason": reason })),
        )
            .into_response(),
        EngineError::UndefinedGuard { .. } | EngineError::UnsupportedEffect { .. } => {
            tracing::error!(error = %e, "contract defect surfaced at trigger time");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}
