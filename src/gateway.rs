//! HTTP surface of the gateway.
//!
//! | Route               | Success body                                 |
//! |---------------------|----------------------------------------------|
//! | `GET /balanza`         | `{"value": 100.01}`                       |
//! | `GET /balanza/detalle` | `{"value", "unit", "samples": [...]}`     |
//! | `GET /refractometro`   | `{"value": 1.333}`                        |
//! | `GET /polarimetro`     | `{"value": -12.875}`                      |
//! | `GET /status`          | service description                       |
//!
//! Failures answer `{"error": "<message>"}` with the status from [`status_for`].

use crate::acquisition::AcquisitionService;
use crate::config::ServerConfig;
use crate::error::{AcquisitionError, ErrorKind};
use crate::instrument::Instrument;
use crate::measurement::StabilizedWeight;
use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Name reported by `/status`.
pub const SERVICE_NAME: &str = "Unified Lab Reading Gateway";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    service: Arc<AcquisitionService>,
    port: u16,
}

/// Successful single-value reading.
#[derive(Debug, Serialize)]
pub struct ValueResponse {
    /// Reading value
    pub value: f64,
}

/// Error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable failure description
    pub error: String,
}

/// `/status` body.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service name
    pub service: &'static str,
    /// Listening port
    pub port: u16,
    /// Current time, RFC 3339
    pub timestamp: String,
    /// Route name to absolute URL
    pub endpoints: BTreeMap<&'static str, String>,
    /// Always `"OK"`
    pub status: &'static str,
}

/// HTTP status for an acquisition failure.
pub fn status_for(error: &AcquisitionError) -> StatusCode {
    match error.kind() {
        ErrorKind::Timeout => StatusCode::REQUEST_TIMEOUT,
        ErrorKind::OutOfRange | ErrorKind::Unstable | ErrorKind::Parse | ErrorKind::Cancelled => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::Connection => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Acquisition failure rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub AcquisitionError);

impl From<AcquisitionError> for ApiError {
    fn from(error: AcquisitionError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status_for(&self.0), Json(body)).into_response()
    }
}

/// Build the application router.
pub fn router(service: Arc<AcquisitionService>, settings: &ServerConfig) -> Router {
    let state = AppState {
        service,
        port: settings.port,
    };

    let mut app = Router::new()
        .route("/balanza", get(balanza))
        .route("/balanza/detalle", get(balanza_detalle))
        .route("/refractometro", get(refractometro))
        .route("/polarimetro", get(polarimetro))
        .route("/status", get(status));

    if let Some(dir) = &settings.static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    let mut app = app.with_state(state);

    if settings.cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
        app = app.layer(cors);
    }

    app.layer(TraceLayer::new_for_http())
}

async fn read_value(
    state: &AppState,
    instrument: Instrument,
) -> Result<Json<ValueResponse>, ApiError> {
    tracing::info!(%instrument, "Reading requested");
    match state.service.acquire(instrument).await {
        Ok(reading) => {
            tracing::info!(%instrument, value = reading.value(), "Reading served");
            Ok(Json(ValueResponse {
                value: reading.value(),
            }))
        }
        Err(e) if e.is_validation() => {
            tracing::warn!(%instrument, error = %e, "Reading rejected");
            Err(e.into())
        }
        Err(e) => {
            tracing::error!(%instrument, error = %e, "Reading failed");
            Err(e.into())
        }
    }
}

async fn balanza(State(state): State<AppState>) -> Result<Json<ValueResponse>, ApiError> {
    read_value(&state, Instrument::Scale).await
}

async fn balanza_detalle(
    State(state): State<AppState>,
) -> Result<Json<StabilizedWeight>, ApiError> {
    let weight = state.service.acquire_weight().await?;
    Ok(Json(weight))
}

async fn refractometro(State(state): State<AppState>) -> Result<Json<ValueResponse>, ApiError> {
    read_value(&state, Instrument::Refractometer).await
}

async fn polarimetro(State(state): State<AppState>) -> Result<Json<ValueResponse>, ApiError> {
    read_value(&state, Instrument::Polarimeter).await
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(status_body(state.port))
}

/// Absolute URLs of every reading route.
pub fn endpoint_urls(port: u16) -> BTreeMap<&'static str, String> {
    let base = format!("http://localhost:{}", port);
    let mut endpoints = BTreeMap::new();
    for instrument in Instrument::ALL {
        endpoints.insert(instrument.tag(), format!("{}/{}", base, instrument.tag()));
    }
    endpoints.insert("balanza_detalle", format!("{}/balanza/detalle", base));
    endpoints
}

fn status_body(port: u16) -> StatusResponse {
    StatusResponse {
        service: SERVICE_NAME,
        port,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        endpoints: endpoint_urls(port),
        status: "OK",
    }
}
