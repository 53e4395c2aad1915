//! In-memory HTTP server the data provider's integration tests run against.
//!
//! Routes:
//! - `GET/POST /points`, `GET/DELETE /points/{id}`: a small JSON store
//! - `GET /raw`: fixed binary payload
//! - `GET /malformed`: truncated JSON
//! - `GET /empty`: 200 with no body
//! - `GET /status/{code}`: any status code
//! - `GET /me`: 401 unless `authorization: Bearer <TOKEN>` is sent
//! - `GET /echo`: the query string as a JSON object
//! - `POST /form`: a form-encoded body echoed back as JSON

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Bearer token `/me` accepts.
pub const TOKEN: &str = "let-me-in";

/// Bytes served by `/raw`.
pub const RAW_PAYLOAD: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Point {
    pub id: Uuid,
    pub x: i64,
    pub y: i64,
}

#[derive(Deserialize)]
pub struct CreatePoint {
    pub x: i64,
    pub y: i64,
}

pub type Db = Arc<RwLock<HashMap<Uuid, Point>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/points", get(list_points).post(create_point))
        .route("/points/{id}", get(get_point).delete(delete_point))
        .route("/raw", get(raw))
        .route("/malformed", get(malformed))
        .route("/empty", get(empty))
        .route("/status/{code}", get(status))
        .route("/me", get(me))
        .route("/echo", get(echo))
        .route("/form", post(form))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn list_points(State(db): State<Db>) -> Json<Vec<Point>> {
    let points = db.read().await;
    Json(points.values().cloned().collect())
}

async fn create_point(
    State(db): State<Db>,
    Json(input): Json<CreatePoint>,
) -> (StatusCode, Json<Point>) {
    let point = Point {
        id: Uuid::new_v4(),
        x: input.x,
        y: input.y,
    };
    db.write().await.insert(point.id, point.clone());
    (StatusCode::CREATED, Json(point))
}

async fn get_point(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> Result<Json<Point>, StatusCode> {
    let points = db.read().await;
    points.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn delete_point(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let mut points = db.write().await;
    points.remove(&id).map(|_| StatusCode::NO_CONTENT).ok_or(StatusCode::NOT_FOUND)
}

async fn raw() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/octet-stream")], RAW_PAYLOAD)
}

async fn malformed() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], "{")
}

async fn empty() -> StatusCode {
    StatusCode::OK
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, String), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, format!("status {code}")))
}

async fn me(headers: HeaderMap) -> Result<Json<serde_json::Value>, StatusCode> {
    let expected = format!("Bearer {TOKEN}");
    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => Ok(Json(serde_json::json!({ "name": "tester" }))),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

async fn echo(Query(params): Query<HashMap<String, String>>) -> Json<HashMap<String, String>> {
    Json(params)
}

async fn form(Form(fields): Form<HashMap<String, String>>) -> Json<HashMap<String, String>> {
    Json(fields)
}
