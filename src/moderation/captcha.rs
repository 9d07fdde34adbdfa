//! CAPTCHA verification against the reCAPTCHA siteverify endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

/// Result of a CAPTCHA check.
#[derive(Debug, Clone)]
pub struct CaptchaOutcome {
    pub ok: bool,
    pub reason: Option<String>,
}

impl CaptchaOutcome {
    fn failure(reason: &str) -> Self {
        Self {
            ok: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// External CAPTCHA verification contract.
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    async fn verify(&self, token: &str, remote_ip: Option<&str>) -> CaptchaOutcome;
}

/// reCAPTCHA siteverify client. A missing secret is itself a failure: the
/// check fails closed instead of waving submissions through.
pub struct RecaptchaVerifier {
    client: reqwest::Client,
    verify_url: String,
    secret: Option<String>,
}

impl RecaptchaVerifier {
    #[must_use]
    pub fn new(client: reqwest::Client, verify_url: String, secret: Option<String>) -> Self {
        Self {
            client,
            verify_url,
            secret,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SiteverifyResponse {
    #[serde(default)]
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

#[async_trait]
impl CaptchaVerifier for RecaptchaVerifier {
    async fn verify(&self, token: &str, remote_ip: Option<&str>) -> CaptchaOutcome {
        let Some(secret) = self.secret.as_deref() else {
            return CaptchaOutcome::failure("missing-secret");
        };

        let mut form = vec![("secret", secret), ("response", token)];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }

        let response = match self.client.post(&self.verify_url).form(&form).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "CAPTCHA verification request failed");
                return CaptchaOutcome::failure("network-error");
            }
        };

        match response.json::<SiteverifyResponse>().await {
            Ok(body) => CaptchaOutcome {
                ok: body.success,
                reason: if body.error_codes.is_empty() {
                    None
                } else {
                    Some(body.error_codes.join(","))
                },
            },
            Err(e) => {
                warn!(error = %e, "CAPTCHA verification returned malformed body");
                CaptchaOutcome::failure("bad-response")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_secret_fails_closed() {
        let verifier = RecaptchaVerifier::new(
            reqwest::Client::new(),
            "https://www.google.com/recaptcha/api/siteverify".to_string(),
            None,
        );
        let outcome = verifier.verify("some-token", Some("1.2.3.4")).await;
        assert!(!outcome.ok);
        assert_eq!(outcome.reason.as_deref(), Some("missing-secret"));
    }
}
