use crate::ipc::{self, AppState};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{from_fn, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use uuid::Uuid;

type Shared = State<Arc<AppState>>;

pub fn status_for_code(code: &str) -> StatusCode {
    match code {
        "bad_params" | "bad_json" => StatusCode::BAD_REQUEST,
        "unauthorized" => StatusCode::UNAUTHORIZED,
        "not_found" | "not_implemented" => StatusCode::NOT_FOUND,
        "not_configured" | "no_database" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({ "error": { "code": code, "message": message } })),
    )
        .into_response()
}

/// Maps a router envelope onto an HTTP status and body.
pub fn envelope_response(mut envelope: Value) -> Response {
    if envelope.get("ok").and_then(Value::as_bool) == Some(true) {
        return (StatusCode::OK, Json(envelope["result"].take())).into_response();
    }
    let code = envelope["error"]["code"].as_str().unwrap_or("internal");
    let message = envelope["error"]["message"].as_str().unwrap_or("");
    error_response(status_for_code(code), code, message)
}

async fn dispatch(state: Arc<AppState>, method: &'static str, params: Value) -> Response {
    let req = ipc::Request {
        id: Uuid::new_v4().to_string(),
        method: method.to_string(),
        params,
    };
    match tokio::task::spawn_blocking(move || ipc::handle_request(&state, req)).await {
        Ok(envelope) => envelope_response(envelope),
        Err(e) => {
            error!(method, error = %e, "request worker failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal", "request worker failed")
        }
    }
}

fn body_params(body: Result<Json<Value>, JsonRejection>) -> Result<Value, Response> {
    body.map(|Json(v)| v)
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, "bad_json", &e.body_text()))
}

async fn healthz(State(state): Shared) -> Response {
    dispatch(state, "health", json!({})).await
}

async fn login(State(state): Shared, body: Result<Json<Value>, JsonRejection>) -> Response {
    match body_params(body) {
        Ok(params) => dispatch(state, "students.login", params).await,
        Err(resp) => resp,
    }
}

async fn student(State(state): Shared, Path(roll_number): Path<String>) -> Response {
    dispatch(state, "students.get", json!({ "rollNumber": roll_number })).await
}

async fn report(State(state): Shared, Path(roll_number): Path<String>) -> Response {
    dispatch(state, "reports.marks", json!({ "rollNumber": roll_number })).await
}

async fn fee_status(State(state): Shared, Path(roll_number): Path<String>) -> Response {
    dispatch(state, "fees.status", json!({ "rollNumber": roll_number })).await
}

async fn attendance_full(State(state): Shared, body: Result<Json<Value>, JsonRejection>) -> Response {
    match body_params(body) {
        Ok(params) => dispatch(state, "attendance.full", params).await,
        Err(resp) => resp,
    }
}

async fn attendance_latest(State(state): Shared, body: Result<Json<Value>, JsonRejection>) -> Response {
    match body_params(body) {
        Ok(params) => dispatch(state, "attendance.latest", params).await,
        Err(resp) => resp,
    }
}

async fn attendance_tracker(State(state): Shared, body: Result<Json<Value>, JsonRejection>) -> Response {
    match body_params(body) {
        Ok(params) => dispatch(state, "attendance.tracker", params).await,
        Err(resp) => resp,
    }
}

async fn posts(State(state): Shared) -> Response {
    dispatch(state, "posts.list", json!({})).await
}

/// Any origin, matching the original deployment's wide-open CORS.
async fn cors_middleware(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        let mut resp = StatusCode::NO_CONTENT.into_response();
        let headers = resp.headers_mut();
        headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
        headers.insert(
            "access-control-allow-methods",
            HeaderValue::from_static("GET,HEAD,PUT,PATCH,POST,DELETE"),
        );
        headers.insert(
            "access-control-allow-headers",
            HeaderValue::from_static("content-type"),
        );
        return resp;
    }
    let mut resp = next.run(req).await;
    resp.headers_mut()
        .insert("access-control-allow-origin", HeaderValue::from_static("*"));
    resp
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/login", post(login))
        .route("/student/:rollNumber", get(student))
        .route("/report/:id", get(report))
        .route("/feeStatus/:rollNumber", get(fee_status))
        .route("/attendance/rollNumber", post(attendance_full))
        .route("/attendance/latest", post(attendance_latest))
        .route("/attendance/tracker", post(attendance_tracker))
        .route("/get-posts", get(posts))
        .layer(from_fn(cors_middleware))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

pub async fn serve(state: Arc<AppState>, listen: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(listen).await?;
    info!(addr = %listener.local_addr()?, "schoold listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
