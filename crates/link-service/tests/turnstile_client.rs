//! # Turnstile Client Tests
//!
//! Points `TurnstileClient` at a local stand-in for the siteverify endpoint.

use std::net::IpAddr;
use std::sync::Arc;

use axum::routing::post;
use axum::{Json, Router};
use link_service::config::CaptchaConfig;
use link_service::{CaptchaVerifier, TurnstileClient};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

async fn stub_siteverify() -> (String, Arc<Mutex<Vec<Value>>>) {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captured);

    let app = Router::new().route(
        "/turnstile/v0/siteverify",
        post(move |Json(body): Json<Value>| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().push(body.clone());
                if body["response"] == "good" {
                    Json(json!({"success": true, "error-codes": []}))
                } else {
                    Json(json!({"success": false, "error-codes": ["invalid-input-response"]}))
                }
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/turnstile/v0/siteverify", addr), captured)
}

fn config(verify_url: String, use_ip: bool) -> CaptchaConfig {
    CaptchaConfig {
        secret: "test-secret".into(),
        use_ip,
        verify_url,
    }
}

#[tokio::test]
async fn test_verify_posts_secret_and_token() {
    let (url, captured) = stub_siteverify().await;
    let client = TurnstileClient::new(&config(url, false)).unwrap();
    let ip: IpAddr = "203.0.113.7".parse().unwrap();

    let outcome = client.verify("good", Some(ip)).await.unwrap();
    assert!(outcome.success);

    let sent = captured.lock().clone();
    assert_eq!(sent, vec![json!({"secret": "test-secret", "response": "good"})]);
}

#[tokio::test]
async fn test_verify_forwards_ip_when_enabled() {
    let (url, captured) = stub_siteverify().await;
    let client = TurnstileClient::new(&config(url, true)).unwrap();
    let ip: IpAddr = "203.0.113.7".parse().unwrap();

    let outcome = client.verify("bad", Some(ip)).await.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.error_codes, vec!["invalid-input-response"]);

    assert_eq!(captured.lock()[0]["remoteip"], "203.0.113.7");
}

#[tokio::test]
async fn test_unreachable_service_is_an_error() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = TurnstileClient::new(&config(format!("http://{}/siteverify", addr), false)).unwrap();
    assert!(client.verify("good", None).await.is_err());
}
