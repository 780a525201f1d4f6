use crate::config::{Settings, SettingsPatch, SettingsStore};
use crate::constants::server::BANNER_MESSAGE;
use crate::error::UpdateError;
use crate::state::{AppStatus, InitPhase, RuntimeState};
use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

/// Everything the handlers need. Cheap to clone.
#[derive(Clone)]
pub struct ApiState {
    pub runtime: Arc<RuntimeState>,
    pub store: Arc<SettingsStore>,
    /// Held across a settings file access and the matching cache write
    settings_lock: Arc<Mutex<()>>,
}

impl ApiState {
    pub fn new(runtime: Arc<RuntimeState>, store: SettingsStore) -> Self {
        ApiState {
            runtime,
            store: Arc::new(store),
            settings_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Run a settings file access and its cache update as one step.
    /// Blocking; call from `spawn_blocking`.
    fn with_settings_lock<T>(&self, f: impl FnOnce(&SettingsStore, &RuntimeState) -> T) -> T {
        let _guard = self
            .settings_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&self.store, &self.runtime)
    }
}

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub ready: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ready: bool,
    pub phase: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub app_status: AppStatus,
}

/// JSON error body: `{"error": "..."}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<UpdateError> for ApiError {
    fn from(e: UpdateError) -> Self {
        match e {
            UpdateError::Validation(e) => ApiError::bad_request(e.to_string()),
            UpdateError::Store(e) => {
                error!("settings write failed: {}", e);
                ApiError::internal(format!("Failed to save settings: {}", e))
            }
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/toggle", post(toggle_handler))
        .route(
            "/settings",
            get(get_settings_handler).post(update_settings_handler),
        )
        .with_state(state)
        // The front-end runs on its own origin and sends credentials
        .layer(CorsLayer::very_permissive())
}

pub async fn serve<F>(listener: TcpListener, state: ApiState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!("listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("http server stopped");
    Ok(())
}

async fn root_handler(State(state): State<ApiState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: BANNER_MESSAGE,
        ready: state.runtime.is_ready(),
    })
}

async fn health_handler(State(state): State<ApiState>) -> Json<HealthResponse> {
    let phase = state.runtime.phase();
    Json(HealthResponse {
        status: "running",
        ready: phase == InitPhase::Ready,
        phase: phase.name(),
    })
}

async fn toggle_handler(State(state): State<ApiState>) -> Json<ToggleResponse> {
    Json(ToggleResponse {
        app_status: state.runtime.toggle(),
    })
}

async fn get_settings_handler(State(state): State<ApiState>) -> Result<Json<Settings>, ApiError> {
    let settings = tokio::task::spawn_blocking(move || {
        // File is authoritative, keep the gate's copy in sync with it
        state.with_settings_lock(|store, runtime| {
            let settings = store.load_or_default();
            runtime.set_debounce_delay(settings.debounce_delay);
            settings
        })
    })
    .await
    .map_err(|e| ApiError::internal(format!("Failed to load settings: {}", e)))?;

    Ok(Json(settings))
}

async fn update_settings_handler(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<Settings>, ApiError> {
    let value: Value = serde_json::from_slice(&body).map_err(|e| {
        warn!("rejected settings body: {}", e);
        ApiError::bad_request(format!("Invalid JSON body: {}", e))
    })?;
    let patch = SettingsPatch::from_json(&value).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let settings = tokio::task::spawn_blocking(move || {
        state.with_settings_lock(|store, runtime| {
            let settings = store.update(&patch)?;
            runtime.set_debounce_delay(settings.debounce_delay);
            Ok::<_, UpdateError>(settings)
        })
    })
    .await
    .map_err(|e| ApiError::internal(format!("Failed to update settings: {}", e)))??;

    Ok(Json(settings))
}
