//! # HTTP Routes
//!
//! Every endpoint answers HTTP 200 with a `{code, msg, data?}` envelope;
//! `code` carries the outcome (200, 400, 401, 500).

mod captcha;
mod user;

use crate::captcha::CaptchaVerifier;
use crate::config::BindingConfig;
use crate::store::UserStore;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{extract::State, Json, Router};
use onebot_bridge::ActionClient;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub captcha: Arc<dyn CaptchaVerifier>,
    pub actions: ActionClient,
    pub binding: BindingConfig,
}

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub code: u16,
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ApiResponse {
    fn new(code: u16, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            data: None,
        }
    }

    pub fn ok(msg: impl Into<String>) -> Self {
        Self::new(200, msg)
    }

    /// Success with a payload. Falls back to a 500 if it cannot be encoded.
    pub fn ok_with<T: Serialize>(msg: impl Into<String>, data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self {
                data: Some(data),
                ..Self::ok(msg)
            },
            Err(e) => {
                error!(error = %e, "Failed to encode response payload");
                Self::server_error("Internal error.")
            }
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(400, msg)
    }

    pub fn missing_params() -> Self {
        Self::bad_request("Missing parameters.")
    }

    pub fn unauthorized() -> Self {
        Self::new(401, "Authentication failed.")
    }

    pub fn server_error(msg: impl Into<String>) -> Self {
        Self::new(500, msg)
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/user/info", post(user::info))
        .route("/user/offline", post(user::offline))
        .route("/user/name", post(user::set_name))
        .route("/user/javaid", post(user::set_javaid))
        .route("/user/xboxid", post(user::set_xboxid))
        .route("/user/qq", post(user::set_qq))
        .route("/captcha/verify", post(captcha::verify))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> ApiResponse {
    let bridge = state.actions.bridge();
    ApiResponse::ok_with(
        "Success.",
        &json!({
            "gateway": bridge.state().to_string(),
            "pendingCalls": bridge.pending_calls(),
        }),
    )
}
