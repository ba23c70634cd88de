pub mod claude;
pub mod gemini;
pub mod ollama;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use insight_core::config::{LlmConfig, OllamaConfig};

use crate::provider::{LlmError, LlmProvider, Message};

const GROQ_BASE_URL: &str = "https://api.groq.com/openai";

/// Create the appropriate LLM provider based on config.
pub fn create_provider(
    llm_config: &LlmConfig,
    ollama_config: &OllamaConfig,
) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match llm_config.provider.as_str() {
        "openai" => {
            let api_key = llm_config
                .openai_api_key
                .as_ref()
                .ok_or_else(|| LlmError::NotConfigured("OPENAI_API_KEY not set".into()))?;
            let base_url = llm_config
                .openai_base_url
                .as_deref()
                .unwrap_or("https://api.openai.com");
            Ok(Arc::new(openai::OpenAiProvider::new(
                api_key.clone(),
                llm_config.openai_model.clone(),
                base_url.to_string(),
            )))
        }
        "groq" => {
            let api_key = llm_config
                .groq_api_key
                .as_ref()
                .ok_or_else(|| LlmError::NotConfigured("GROQ_API_KEY not set".into()))?;
            Ok(Arc::new(openai::OpenAiProvider::new(
                api_key.clone(),
                llm_config.groq_model.clone(),
                GROQ_BASE_URL.to_string(),
            )))
        }
        "anthropic" | "claude" => {
            let api_key = llm_config
                .anthropic_api_key
                .as_ref()
                .ok_or_else(|| LlmError::NotConfigured("ANTHROPIC_API_KEY not set".into()))?;
            Ok(Arc::new(claude::ClaudeProvider::new(
                api_key.clone(),
                llm_config.anthropic_model.clone(),
            )))
        }
        "gemini" => {
            let api_key = llm_config
                .gemini_api_key
                .as_ref()
                .ok_or_else(|| LlmError::NotConfigured("GEMINI_API_KEY not set".into()))?;
            Ok(Arc::new(gemini::GeminiProvider::new(
                api_key.clone(),
                llm_config.gemini_model.clone(),
            )))
        }
        "ollama" => Ok(Arc::new(ollama::OllamaProvider::new(
            ollama_config.url.clone(),
            ollama_config.model.clone(),
        ))),
        other => Err(LlmError::NotConfigured(format!(
            "unknown LLM provider: '{}'",
            other
        ))),
    }
}

/// Stands in for a provider that could not be built; every call reports why.
#[derive(Debug, Clone)]
pub struct UnavailableProvider {
    reason: String,
}

impl UnavailableProvider {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl LlmProvider for UnavailableProvider {
    async fn complete(
        &self,
        _messages: Vec<Message>,
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<String, LlmError> {
        Err(LlmError::NotConfigured(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn llm_config(provider: &str) -> LlmConfig {
        LlmConfig {
            provider: provider.to_string(),
            openai_api_key: None,
            openai_model: "gpt".into(),
            openai_base_url: None,
            groq_api_key: None,
            groq_model: "llama".into(),
            anthropic_api_key: None,
            anthropic_model: "claude".into(),
            gemini_api_key: None,
            gemini_model: "gemini".into(),
            temperature: 0.2,
            max_tokens: 1024,
            text_max_tokens: 300,
        }
    }

    fn ollama() -> OllamaConfig {
        OllamaConfig {
            url: "http://localhost:11434".into(),
            model: "llama3.2".into(),
        }
    }

    #[test]
    fn missing_key_is_not_configured() {
        for provider in ["openai", "groq", "anthropic", "gemini"] {
            let err = create_provider(&llm_config(provider), &ollama()).err().unwrap();
            assert!(matches!(err, LlmError::NotConfigured(_)), "{provider}");
        }
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = create_provider(&llm_config("mystery"), &ollama()).err().unwrap();
        assert!(err.to_string().contains("mystery"));
    }

    #[test]
    fn keyed_providers_build() {
        let mut cfg = llm_config("groq");
        cfg.groq_api_key = Some("k".into());
        assert!(create_provider(&cfg, &ollama()).is_ok());
        assert!(create_provider(&llm_config("ollama"), &ollama()).is_ok());
    }

    #[tokio::test]
    async fn unavailable_provider_reports_reason() {
        let provider = UnavailableProvider::new("GROQ_API_KEY not set");
        let err = provider.complete(vec![Message::user("hi")], 0.2, 10).await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured(ref r) if r == "GROQ_API_KEY not set"));
    }
}
