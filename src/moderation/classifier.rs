//! AI-assisted content classification via the OpenAI moderation endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

/// Result of a classification attempt.
///
/// `available` distinguishes "checked and clean" from "could not check"; the
/// pipeline treats an unreachable classifier as a risk signal, not a pass.
#[derive(Debug, Clone, Copy)]
pub struct Classification {
    pub available: bool,
    pub flagged: bool,
}

/// External content-classifier contract.
#[async_trait]
pub trait ContentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Classification;
}

/// OpenAI moderation API client.
pub struct OpenAiModerationClassifier {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl OpenAiModerationClassifier {
    #[must_use]
    pub fn new(client: reqwest::Client, api_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            api_url,
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModerationResponse {
    #[serde(default)]
    results: Vec<ModerationResult>,
}

#[derive(Debug, Deserialize)]
struct ModerationResult {
    #[serde(default)]
    flagged: bool,
}

#[async_trait]
impl ContentClassifier for OpenAiModerationClassifier {
    async fn classify(&self, text: &str) -> Classification {
        let Some(api_key) = self.api_key.as_deref() else {
            return Classification {
                available: false,
                flagged: false,
            };
        };

        let response = match self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&json!({
                "model": "omni-moderation-latest",
                "input": text,
            }))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Moderation request failed");
                return Classification {
                    available: false,
                    flagged: false,
                };
            }
        };

        if !response.status().is_success() {
            // The service answered but refused us; treat as flagged rather
            // than silently approving unscreened content.
            warn!(status = %response.status(), "Moderation endpoint returned an error");
            return Classification {
                available: true,
                flagged: true,
            };
        }

        match response.json::<ModerationResponse>().await {
            Ok(body) => Classification {
                available: true,
                flagged: body.results.first().is_some_and(|r| r.flagged),
            },
            Err(e) => {
                warn!(error = %e, "Moderation response was malformed");
                Classification {
                    available: true,
                    flagged: true,
                }
            }
        }
    }
}
