use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use super::{BotScore, BotVerifier};

const SITEVERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

pub struct RecaptchaVerifier {
    secret_key: String,
    client: reqwest::Client,
}

impl RecaptchaVerifier {
    pub fn new(secret_key: String) -> Self {
        RecaptchaVerifier {
            secret_key,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    // v3 responses carry a score; absent means v2 or an error payload.
    score: Option<f64>,
}

#[async_trait]
impl BotVerifier for RecaptchaVerifier {
    async fn verify(&self, token: &str) -> anyhow::Result<BotScore> {
        let response = self
            .client
            .post(SITEVERIFY_URL)
            .form(&[
                ("secret", self.secret_key.as_str()),
                ("response", token),
            ])
            .send()
            .await
            .context("failed to reach reCAPTCHA siteverify")?
            .error_for_status()
            .context("reCAPTCHA siteverify returned error")?;

        let body: SiteVerifyResponse = response
            .json()
            .await
            .context("invalid reCAPTCHA siteverify response")?;

        Ok(BotScore {
            success: body.success,
            score: body.score.unwrap_or(0.0),
        })
    }
}
