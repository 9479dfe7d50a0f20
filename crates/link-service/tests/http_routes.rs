//! # HTTP Route Tests
//!
//! The router runs against an in-memory user store, a scripted captcha
//! verifier and a real bridge connected to an in-memory gateway that knows
//! a fixed set of group members.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use link_service::config::BindingConfig;
use link_service::store::{UserRecord, UserStore, UserUpdate};
use link_service::{
    router, ApiResponse, AppState, CaptchaError, CaptchaOutcome, CaptchaVerifier,
    InMemoryUserStore,
};
use onebot_bridge::{ActionClient, BridgeConfig, BridgeHandle, MemoryConnector, MemoryGateway};
use parking_lot::Mutex;
use serde_json::{json, Value};
use shared_bus::EventBus;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tower::ServiceExt;
use uuid::Uuid;

const VERIFICATION_GROUP: i64 = 747121127;
const MEMBERS: [i64; 2] = [123456, 654321];
const WAIT: Duration = Duration::from_secs(2);

#[derive(Default)]
struct ScriptedCaptcha {
    seen_ips: Mutex<Vec<Option<IpAddr>>>,
}

#[async_trait]
impl CaptchaVerifier for ScriptedCaptcha {
    async fn verify(&self, token: &str, remote_ip: Option<IpAddr>) -> Result<CaptchaOutcome, CaptchaError> {
        self.seen_ips.lock().push(remote_ip);
        let success = token == "good";
        Ok(CaptchaOutcome {
            success,
            score: success.then_some(0.9),
            error_codes: if success {
                Vec::new()
            } else {
                vec!["invalid-input-response".to_string()]
            },
        })
    }
}

struct Harness {
    router: Router,
    store: Arc<InMemoryUserStore>,
    captcha: Arc<ScriptedCaptcha>,
    bridge: BridgeHandle,
    uuid: Uuid,
    session: String,
    token: String,
    _gateway: MemoryGateway,
    _daemon: JoinHandle<()>,
}

/// Answers `get_group_member_info` for known members, fails everything else.
async fn start_gateway() -> (BridgeHandle, MemoryGateway, JoinHandle<()>) {
    let (connector, mut gateway) = MemoryConnector::pair();
    let bridge = BridgeHandle::start(
        BridgeConfig::new("ws://memory:3001").with_reconnect_delay(Duration::from_millis(50)),
        Arc::new(connector),
        EventBus::new(),
    );

    let mut peer = timeout(WAIT, gateway.accept()).await.unwrap().unwrap();
    timeout(WAIT, bridge.wait_until_open()).await.unwrap().unwrap();

    let daemon = tokio::spawn(async move {
        while let Some(request) = peer.next_request().await {
            let group_id = request.params["group_id"].as_i64().unwrap_or_default();
            let user_id = request.params["user_id"].as_i64().unwrap_or_default();
            let known = request.action == "get_group_member_info"
                && group_id == VERIFICATION_GROUP
                && MEMBERS.contains(&user_id);

            let reply = if known {
                json!({
                    "status": "ok",
                    "retcode": 0,
                    "data": {"group_id": group_id, "user_id": user_id, "nickname": "member"},
                    "echo": request.echo,
                })
            } else {
                json!({
                    "status": "failed",
                    "retcode": 100,
                    "msg": "no such member",
                    "data": null,
                    "echo": request.echo,
                })
            };
            peer.send_json(&reply);
        }
    });

    (bridge, gateway, daemon)
}

async fn harness() -> Harness {
    let (bridge, gateway, daemon) = start_gateway().await;

    let store = Arc::new(InMemoryUserStore::new());
    let uuid = store.insert(UserRecord::new("steve"));
    let (session, token) = store.open_session(uuid, "laptop").unwrap();
    let captcha = Arc::new(ScriptedCaptcha::default());

    let state = AppState {
        store: store.clone(),
        captcha: captcha.clone(),
        actions: ActionClient::new(bridge.clone()),
        binding: BindingConfig {
            verification_group_id: VERIFICATION_GROUP,
        },
    };

    Harness {
        router: router(state),
        store,
        captcha,
        bridge,
        uuid,
        session,
        token,
        _gateway: gateway,
        _daemon: daemon,
    }
}

async fn send(router: &Router, request: Request<Body>) -> ApiResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn post(router: &Router, uri: &str, body: Value) -> ApiResponse {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

#[tokio::test]
async fn test_info() {
    let h = harness().await;

    let missing = post(&h.router, "/user/info", json!({})).await;
    assert_eq!(missing.code, 400);

    let denied = post(&h.router, "/user/info", json!({"token": "bogus"})).await;
    assert_eq!(denied.code, 401);

    let ok = post(&h.router, "/user/info", json!({"token": h.token})).await;
    assert_eq!(ok.code, 200);
    let data = ok.data.unwrap();
    assert_eq!(data["name"], "steve");
    assert_eq!(data["uuid"], h.uuid.to_string());
    assert_eq!(data["currentSession"], h.session);
}

#[tokio::test]
async fn test_malformed_body_is_missing_params() {
    let h = harness().await;
    let request = Request::builder()
        .method("POST")
        .uri("/user/info")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();

    assert_eq!(send(&h.router, request).await.code, 400);
}

#[tokio::test]
async fn test_offline_reports_current_device() {
    let h = harness().await;
    let (other_session, _) = h.store.open_session(h.uuid, "phone").unwrap();

    let other = post(
        &h.router,
        "/user/offline",
        json!({"token": h.token, "sessionId": other_session}),
    )
    .await;
    assert_eq!(other.code, 200);
    assert_eq!(other.data.unwrap()["isCurrentDevice"], false);

    let current = post(
        &h.router,
        "/user/offline",
        json!({"token": h.token, "sessionId": h.session}),
    )
    .await;
    assert_eq!(current.code, 200);
    assert_eq!(current.data.unwrap()["isCurrentDevice"], true);

    // The token died with its session.
    let after = post(&h.router, "/user/info", json!({"token": h.token})).await;
    assert_eq!(after.code, 401);
}

#[tokio::test]
async fn test_offline_unknown_session() {
    let h = harness().await;
    let response = post(
        &h.router,
        "/user/offline",
        json!({"token": h.token, "sessionId": "nope"}),
    )
    .await;
    assert_eq!(response.code, 500);
}

#[tokio::test]
async fn test_set_name() {
    let h = harness().await;
    h.store.insert(UserRecord::new("alex"));

    let taken = post(&h.router, "/user/name", json!({"token": h.token, "name": "alex"})).await;
    assert_eq!(taken.code, 400);
    assert_eq!(taken.msg, "Username already exists.");

    let renamed = post(&h.router, "/user/name", json!({"token": h.token, "name": "herobrine"})).await;
    assert_eq!(renamed.code, 200);
    assert_eq!(h.store.get(h.uuid).unwrap().name, "herobrine");
}

#[tokio::test]
async fn test_game_ids_must_be_unused_in_either_field() {
    let h = harness().await;
    let other = h.store.insert(UserRecord::new("alex"));
    h.store
        .update(other, UserUpdate::XboxId("Alex123".into()))
        .await
        .unwrap();

    let java = post(&h.router, "/user/javaid", json!({"token": h.token, "javaid": "Alex123"})).await;
    assert_eq!(java.code, 400);
    assert_eq!(java.msg, "JavaID or XboxID already exists.");

    let java = post(&h.router, "/user/javaid", json!({"token": h.token, "javaid": "Steve"})).await;
    assert_eq!(java.code, 200);

    let xbox = post(&h.router, "/user/xboxid", json!({"token": h.token, "xboxid": "Steve"})).await;
    assert_eq!(xbox.code, 400);
    assert_eq!(xbox.msg, "XboxID or JavaID already exists.");

    let xbox = post(&h.router, "/user/xboxid", json!({"token": h.token, "xboxid": "SteveLive"})).await;
    assert_eq!(xbox.code, 200);

    let stored = h.store.get(h.uuid).unwrap();
    assert_eq!(stored.javaid.as_deref(), Some("Steve"));
    assert_eq!(stored.xboxid.as_deref(), Some("SteveLive"));
}

#[tokio::test]
async fn test_bind_qq_verified_through_gateway() {
    let h = harness().await;

    let unknown = post(&h.router, "/user/qq", json!({"token": h.token, "qq": 999})).await;
    assert_eq!(unknown.code, 400);
    assert_eq!(unknown.msg, "QQ number does not exist.");

    let bound = post(&h.router, "/user/qq", json!({"token": h.token, "qq": "123456"})).await;
    assert_eq!(bound.code, 200);
    assert_eq!(h.store.get(h.uuid).unwrap().qq, Some(123456));

    // Someone else trying the same number.
    let other = h.store.insert(UserRecord::new("alex"));
    let (_, other_token) = h.store.open_session(other, "phone").unwrap();
    let taken = post(&h.router, "/user/qq", json!({"token": other_token, "qq": 123456})).await;
    assert_eq!(taken.code, 400);
    assert_eq!(taken.msg, "QQ number is already bound.");

    assert_eq!(h.bridge.pending_calls(), 0);
}

#[tokio::test]
async fn test_bind_qq_with_gateway_down() {
    let h = harness().await;
    h.bridge.shutdown().await;

    let response = post(&h.router, "/user/qq", json!({"token": h.token, "qq": 654321})).await;
    assert_eq!(response.code, 400);
    assert_eq!(response.msg, "QQ number does not exist.");
    assert_eq!(h.store.get(h.uuid).unwrap().qq, None);
}

#[tokio::test]
async fn test_bind_qq_missing_params() {
    let h = harness().await;
    let response = post(&h.router, "/user/qq", json!({"token": h.token, "qq": "not a number"})).await;
    assert_eq!(response.code, 400);
    assert_eq!(response.msg, "Missing parameters.");
}

#[tokio::test]
async fn test_captcha_relays_outcome() {
    let h = harness().await;

    let missing = post(&h.router, "/captcha/verify", json!({})).await;
    assert_eq!(missing.code, 400);

    let request = Request::builder()
        .method("POST")
        .uri("/captcha/verify")
        .header("content-type", "application/json")
        .header("x-forwarded-for", "203.0.113.7")
        .body(Body::from(json!({"token": "bad"}).to_string()))
        .unwrap();
    let failed = send(&h.router, request).await;
    assert_eq!(failed.code, 200);
    let data = failed.data.unwrap();
    assert_eq!(data["success"], false);
    assert_eq!(data["error_codes"], json!(["invalid-input-response"]));

    let passed = post(&h.router, "/captcha/verify", json!({"token": "good"})).await;
    assert_eq!(passed.data.unwrap()["success"], true);

    let seen = h.captcha.seen_ips.lock().clone();
    assert_eq!(seen, vec![Some("203.0.113.7".parse().unwrap()), None]);
}

#[tokio::test]
async fn test_health_reports_gateway_state() {
    let h = harness().await;
    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let health = send(&h.router, request).await;
    assert_eq!(health.code, 200);
    assert_eq!(health.data.unwrap()["gateway"], "open");
}
