//! `/user/*` handlers.

use super::{ApiResponse, AppState};
use crate::store::{AuthenticatedUser, UserFilter, UserUpdate};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use shared_types::Uin;
use tracing::{debug, error, info};

/// Union of the fields the user routes accept.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(super) struct UserRequest {
    token: Option<String>,
    session_id: Option<String>,
    name: Option<String>,
    javaid: Option<String>,
    xboxid: Option<String>,
    /// Number or numeric string.
    qq: Option<Value>,
}

type Body = Result<Json<UserRequest>, JsonRejection>;

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.is_empty())
}

fn parse_qq(field: &Option<Value>) -> Option<Uin> {
    let qq = match field {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    qq.filter(|qq| *qq > 0)
}

async fn authenticate(state: &AppState, token: &str) -> Result<AuthenticatedUser, ApiResponse> {
    match state.store.verify_token(token).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(ApiResponse::unauthorized()),
        Err(e) => {
            error!(error = %e, "Token lookup failed");
            Err(ApiResponse::server_error("Database error."))
        }
    }
}

/// Reject with `msg` if any user already matches `filter`.
async fn ensure_unused(state: &AppState, filter: UserFilter, msg: &str) -> Result<(), ApiResponse> {
    match state.store.exists(&filter).await {
        Ok(false) => Ok(()),
        Ok(true) => Err(ApiResponse::bad_request(msg)),
        Err(e) => {
            error!(error = %e, ?filter, "Uniqueness lookup failed");
            Err(ApiResponse::server_error("Database error."))
        }
    }
}

async fn apply(state: &AppState, user: &AuthenticatedUser, update: UserUpdate) -> ApiResponse {
    match state.store.update(user.user.uuid, update.clone()).await {
        Ok(()) => {
            info!(uuid = %user.user.uuid, ?update, "User updated");
            ApiResponse::ok("Updated.")
        }
        Err(e) => {
            error!(uuid = %user.user.uuid, error = %e, "User update failed");
            ApiResponse::server_error("Update failed.")
        }
    }
}

macro_rules! try_api {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(response) => return response,
        }
    };
}

pub(super) async fn info(State(state): State<AppState>, body: Body) -> ApiResponse {
    let Ok(Json(body)) = body else {
        return ApiResponse::missing_params();
    };
    let Some(token) = present(&body.token) else {
        return ApiResponse::missing_params();
    };

    let user = try_api!(authenticate(&state, token).await);
    ApiResponse::ok_with("Success.", &user)
}

pub(super) async fn offline(State(state): State<AppState>, body: Body) -> ApiResponse {
    let Ok(Json(body)) = body else {
        return ApiResponse::missing_params();
    };
    let (Some(token), Some(session_id)) = (present(&body.token), present(&body.session_id)) else {
        return ApiResponse::missing_params();
    };

    let user = try_api!(authenticate(&state, token).await);
    let is_current_device = session_id == user.current_session;

    match state.store.remove_session(user.user.uuid, session_id).await {
        Ok(()) => {
            info!(uuid = %user.user.uuid, session_id, "Session logged out");
            ApiResponse::ok_with("Success.", &json!({ "isCurrentDevice": is_current_device }))
        }
        Err(e) => ApiResponse::server_error(e.to_string()),
    }
}

pub(super) async fn set_name(State(state): State<AppState>, body: Body) -> ApiResponse {
    let Ok(Json(body)) = body else {
        return ApiResponse::missing_params();
    };
    let (Some(name), Some(token)) = (present(&body.name), present(&body.token)) else {
        return ApiResponse::missing_params();
    };

    let user = try_api!(authenticate(&state, token).await);
    try_api!(ensure_unused(&state, UserFilter::Name(name.to_string()), "Username already exists.").await);
    apply(&state, &user, UserUpdate::Name(name.to_string())).await
}

pub(super) async fn set_javaid(State(state): State<AppState>, body: Body) -> ApiResponse {
    let Ok(Json(body)) = body else {
        return ApiResponse::missing_params();
    };
    let (Some(javaid), Some(token)) = (present(&body.javaid), present(&body.token)) else {
        return ApiResponse::missing_params();
    };

    let user = try_api!(authenticate(&state, token).await);
    try_api!(
        ensure_unused(&state, UserFilter::GameId(javaid.to_string()), "JavaID or XboxID already exists.").await
    );
    apply(&state, &user, UserUpdate::JavaId(javaid.to_string())).await
}

pub(super) async fn set_xboxid(State(state): State<AppState>, body: Body) -> ApiResponse {
    let Ok(Json(body)) = body else {
        return ApiResponse::missing_params();
    };
    let (Some(xboxid), Some(token)) = (present(&body.xboxid), present(&body.token)) else {
        return ApiResponse::missing_params();
    };

    let user = try_api!(authenticate(&state, token).await);
    try_api!(
        ensure_unused(&state, UserFilter::GameId(xboxid.to_string()), "XboxID or JavaID already exists.").await
    );
    apply(&state, &user, UserUpdate::XboxId(xboxid.to_string())).await
}

pub(super) async fn set_qq(State(state): State<AppState>, body: Body) -> ApiResponse {
    let Ok(Json(body)) = body else {
        return ApiResponse::missing_params();
    };
    let (Some(qq), Some(token)) = (parse_qq(&body.qq), present(&body.token)) else {
        return ApiResponse::missing_params();
    };

    let user = try_api!(authenticate(&state, token).await);

    // Membership of the verification group proves the number exists.
    let group_id = state.binding.verification_group_id;
    if let Err(e) = state.actions.get_group_member_info(group_id, qq, false).await {
        debug!(qq, group_id, error = %e, "QQ verification failed");
        return ApiResponse::bad_request("QQ number does not exist.");
    }

    try_api!(ensure_unused(&state, UserFilter::Qq(qq), "QQ number is already bound.").await);
    apply(&state, &user, UserUpdate::Qq(qq)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_qq_accepts_numbers_and_strings() {
        assert_eq!(parse_qq(&Some(json!(123456))), Some(123456));
        assert_eq!(parse_qq(&Some(json!(" 123456 "))), Some(123456));
        assert_eq!(parse_qq(&Some(json!(0))), None);
        assert_eq!(parse_qq(&Some(json!("abc"))), None);
        assert_eq!(parse_qq(&None), None);
    }

    #[test]
    fn test_present_skips_empty_strings() {
        assert_eq!(present(&Some("x".into())), Some("x"));
        assert_eq!(present(&Some(String::new())), None);
        assert_eq!(present(&None), None);
    }

    #[test]
    fn test_request_field_names() {
        let body: UserRequest =
            serde_json::from_value(json!({"token": "t", "sessionId": "s", "qq": "1"})).unwrap();
        assert_eq!(body.session_id.as_deref(), Some("s"));
        assert_eq!(parse_qq(&body.qq), Some(1));
    }
}
