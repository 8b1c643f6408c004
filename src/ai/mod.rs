mod openai;

pub use openai::OpenAiClient;

use async_trait::async_trait;

use crate::error::Result;

/// Chat model that answers with a JSON object.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete_json(&self, system: &str, user: &str, max_tokens: u32) -> Result<serde_json::Value>;

    async fn complete_json_with_temperature(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        _temperature: f32,
    ) -> Result<serde_json::Value> {
        self.complete_json(system, user, max_tokens).await
    }
}

/// Text embedding backend.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
