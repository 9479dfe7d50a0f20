//! `/captcha/verify`.

use super::{ApiResponse, AppState};
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use tracing::error;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct CaptchaRequest {
    token: Option<String>,
}

/// First `X-Forwarded-For` hop, else the peer address.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse().ok())
        .or_else(|| peer.map(|addr| addr.ip()))
}

pub(super) async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Result<Json<CaptchaRequest>, JsonRejection>,
) -> ApiResponse {
    let Ok(Json(body)) = body else {
        return ApiResponse::missing_params();
    };
    let Some(token) = body.token.as_deref().filter(|t| !t.is_empty()) else {
        return ApiResponse::missing_params();
    };

    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    match state.captcha.verify(token, ip).await {
        Ok(outcome) => ApiResponse::ok_with("Success.", &outcome),
        Err(e) => {
            error!(error = %e, "Captcha verification failed");
            ApiResponse::server_error("Captcha service unavailable.")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        let peer: SocketAddr = "10.0.0.1:5000".parse().unwrap();

        assert_eq!(
            client_ip(&headers, Some(peer)),
            Some("203.0.113.7".parse().unwrap())
        );
        assert_eq!(
            client_ip(&HeaderMap::new(), Some(peer)),
            Some("10.0.0.1".parse().unwrap())
        );
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }
}
