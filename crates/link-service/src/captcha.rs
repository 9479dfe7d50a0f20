//! Cloudflare Turnstile verification.

use crate::config::CaptchaConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

/// What Turnstile said about a token. Relayed to the client as-is.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CaptchaOutcome {
    pub success: bool,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default, rename(deserialize = "error-codes"), alias = "error_codes")]
    pub error_codes: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CaptchaError {
    #[error("captcha service request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[async_trait]
pub trait CaptchaVerifier: Send + Sync + 'static {
    async fn verify(&self, token: &str, remote_ip: Option<IpAddr>) -> Result<CaptchaOutcome, CaptchaError>;
}

#[derive(Debug, Serialize)]
struct SiteVerifyRequest<'a> {
    secret: &'a str,
    response: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    remoteip: Option<String>,
}

/// Turnstile siteverify client.
#[derive(Debug, Clone)]
pub struct TurnstileClient {
    http: reqwest::Client,
    secret: String,
    verify_url: String,
    use_ip: bool,
}

impl TurnstileClient {
    pub fn new(config: &CaptchaConfig) -> Result<Self, CaptchaError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            secret: config.secret.clone(),
            verify_url: config.verify_url.clone(),
            use_ip: config.use_ip,
        })
    }
}

#[async_trait]
impl CaptchaVerifier for TurnstileClient {
    async fn verify(&self, token: &str, remote_ip: Option<IpAddr>) -> Result<CaptchaOutcome, CaptchaError> {
        let request = SiteVerifyRequest {
            secret: &self.secret,
            response: token,
            remoteip: remote_ip.filter(|_| self.use_ip).map(|ip| ip.to_string()),
        };

        let outcome: CaptchaOutcome = self
            .http
            .post(&self.verify_url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(success = outcome.success, errors = ?outcome.error_codes, "Turnstile verdict");
        Ok(outcome)
    }
}
