pub mod recaptcha;

use async_trait::async_trait;

/// Raw verdict from the bot-score oracle. Thresholding is the admission
/// pipeline's decision, not the transport's.
#[derive(Debug, Clone, Copy)]
pub struct BotScore {
    pub success: bool,
    pub score: f64,
}

#[async_trait]
pub trait BotVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> anyhow::Result<BotScore>;
}
