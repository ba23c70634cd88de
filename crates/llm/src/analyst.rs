//! Caller-facing analysis operations.
//!
//! Every operation runs prompt → model (under retry) → extract → repair →
//! validate → cache, and degrades to a deterministic fallback instead of
//! returning an error. Results say which path produced them.

use std::sync::Arc;

use tracing::{debug, info, warn};

use insight_core::config::{AnalysisConfig, Config, LlmConfig};
use insight_core::{
    DataSample, FieldClassification, Narrative, Report, ResultSource, VisualizationConfig,
};

use crate::cache::{fingerprint, ResultCache};
use crate::clock::{Clock, SystemClock};
use crate::error::{AnalysisError, JsonShape};
use crate::extract::parse_response;
use crate::fallback::{
    fallback_answer, fallback_summary, fallback_visualization, fallback_visualizations,
};
use crate::prompt::{
    answer_prompt, auto_visualization_prompt, summary_prompt, visualization_prompt, PromptContext,
};
use crate::provider::{LlmError, LlmProvider, Message};
use crate::providers::{create_provider, UnavailableProvider};
use crate::retry::{RetryController, RetryPolicy};
use crate::validate::{validate_batch, validate_single};

/// Sampling parameters sent with every completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub temperature: f32,
    /// Budget for chart requests.
    pub max_tokens: u32,
    /// Budget for summaries and answers.
    pub text_max_tokens: u32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 2048,
            text_max_tokens: 600,
        }
    }
}

impl From<&LlmConfig> for ModelSettings {
    fn from(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            text_max_tokens: config.text_max_tokens,
        }
    }
}

pub struct Analyst {
    provider: Arc<dyn LlmProvider>,
    settings: ModelSettings,
    config: AnalysisConfig,
    retry: RetryController,
    summaries: ResultCache<Narrative>,
    answers: ResultCache<Narrative>,
    charts: ResultCache<VisualizationConfig>,
    chart_sets: ResultCache<Vec<VisualizationConfig>>,
}

impl Analyst {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        settings: ModelSettings,
        config: AnalysisConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let capacity = config.cache_capacity;
        Self {
            retry: RetryController::new(RetryPolicy::from_config(&config), clock.clone()),
            summaries: ResultCache::new(capacity, config.summary_ttl(), clock.clone()),
            answers: ResultCache::new(capacity, config.answer_ttl(), clock.clone()),
            charts: ResultCache::new(capacity, config.chart_ttl(), clock.clone()),
            chart_sets: ResultCache::new(capacity, config.chart_ttl(), clock),
            provider,
            settings,
            config,
        }
    }

    /// Build from config, creating the appropriate provider. A provider that
    /// cannot be built leaves every operation on its fallback path.
    pub fn from_config(config: &Config) -> Self {
        let provider: Arc<dyn LlmProvider> = match create_provider(&config.llm, &config.ollama) {
            Ok(provider) => provider,
            Err(e) => {
                warn!(error = %e, "LLM provider unavailable, serving fallback results only");
                Arc::new(UnavailableProvider::new(e.to_string()))
            }
        };
        Self::new(
            provider,
            ModelSettings::from(&config.llm),
            config.analysis.clone(),
            Arc::new(SystemClock),
        )
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Plain-prose summary, hard-capped at `max_summary_words`.
    pub async fn summarize(&self, data: &DataSample) -> Narrative {
        let key = fingerprint("summarize", data);
        if let Some(hit) = self.summaries.get(&key) {
            info!("summary cache hit");
            return hit;
        }

        let max_words = self.config.max_summary_words;
        let result = match PromptContext::build(data, self.config.text_sample_size)
            .and_then(|ctx| summary_prompt(&ctx, max_words))
        {
            Ok(prompt) => self.narrate("summarize", &prompt).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(text) => {
                let narrative = Narrative {
                    text: cap_words(&text, max_words),
                    source: ResultSource::Model,
                };
                self.summaries.put(key, narrative.clone());
                narrative
            }
            Err(e) => {
                warn!(error = %e, "summary falling back to data overview");
                fallback_summary(&data.records())
            }
        }
    }

    pub async fn answer(&self, question: &str, data: &DataSample) -> Narrative {
        let question = question.trim();
        let key = fingerprint(&format!("answer\n{question}"), data);
        if let Some(hit) = self.answers.get(&key) {
            info!(question, "answer cache hit");
            return hit;
        }

        let max_words = self.config.max_summary_words;
        let result = match PromptContext::build(data, self.config.text_sample_size)
            .and_then(|ctx| answer_prompt(&ctx, question, max_words))
        {
            Ok(prompt) => self.narrate("answer", &prompt).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(text) => {
                let narrative = Narrative {
                    text: cap_words(&text, max_words),
                    source: ResultSource::Model,
                };
                self.answers.put(key, narrative.clone());
                narrative
            }
            Err(e) => {
                warn!(question, error = %e, "answer falling back");
                fallback_answer(question)
            }
        }
    }

    /// One chart for a free-text request. Data without a numeric and a
    /// categorical field skips the model and goes straight to the fallback.
    pub async fn visualize(&self, request: &str, data: &DataSample) -> VisualizationConfig {
        let request = request.trim();
        let key = fingerprint(&format!("visualize\n{request}"), data);
        if let Some(hit) = self.charts.get(&key) {
            info!(request, "visualization cache hit");
            return hit;
        }

        let max_points = self.config.max_chart_points;
        let result = match PromptContext::build(data, self.config.chart_sample_size)
            .and_then(|ctx| visualization_prompt(&ctx, request, max_points))
        {
            Ok(prompt) => {
                self.retry
                    .run("visualize", |_| self.attempt_single(&prompt))
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(config) => {
                info!(kind = %config.kind, title = %config.title, "visualization from model");
                self.charts.put(key, config.clone());
                config
            }
            Err(e) => {
                log_fallback("visualize", &e);
                fallback_visualization(request, &data.records(), max_points)
            }
        }
    }

    /// Up to `max_auto_charts` charts chosen by the model. Empty when the
    /// data has no (categorical, numeric) field pair; no model call is made then.
    pub async fn auto_visualize(&self, data: &DataSample) -> Vec<VisualizationConfig> {
        let key = fingerprint("auto_visualize", data);
        if let Some(hit) = self.chart_sets.get(&key) {
            info!(charts = hit.len(), "auto-visualization cache hit");
            return hit;
        }

        let prompt = PromptContext::build(data, self.config.chart_sample_size).and_then(|ctx| {
            auto_visualization_prompt(
                &ctx,
                self.config.max_auto_charts,
                self.config.max_chart_points,
            )
        });
        let prompt = match prompt {
            Ok(prompt) => prompt,
            Err(e) => {
                info!(reason = %e, "nothing to auto-visualize");
                return Vec::new();
            }
        };

        match self
            .retry
            .run("auto_visualize", |_| self.attempt_batch(&prompt))
            .await
        {
            Ok(charts) => {
                info!(charts = charts.len(), "auto-visualization from model");
                self.chart_sets.put(key, charts.clone());
                charts
            }
            Err(e) => {
                log_fallback("auto_visualize", &e);
                fallback_visualizations(
                    &data.records(),
                    self.config.max_fallback_charts,
                    self.config.max_chart_points,
                )
            }
        }
    }

    /// Summary and charts for one dataset, requested concurrently.
    pub async fn report(&self, data: &DataSample) -> Report {
        let (summary, mut charts) = tokio::join!(self.summarize(data), self.auto_visualize(data));
        if charts.is_empty() {
            let records = data.records();
            if FieldClassification::classify(&records).is_chartable() {
                charts.push(fallback_visualization("", &records, self.config.max_chart_points));
            }
        }
        Report { summary, charts }
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, AnalysisError> {
        debug!(prompt_len = prompt.len(), "sending prompt");
        let text = self
            .provider
            .complete(vec![Message::user(prompt)], self.settings.temperature, max_tokens)
            .await?;
        debug!(response = %text, "raw model response");
        Ok(text)
    }

    async fn narrate(&self, label: &str, prompt: &str) -> Result<String, AnalysisError> {
        self.retry.run(label, |_| self.attempt_text(prompt)).await
    }

    async fn attempt_text(&self, prompt: &str) -> Result<String, AnalysisError> {
        let text = self.complete(prompt, self.settings.text_max_tokens).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(LlmError::ParseError("empty completion".into()).into());
        }
        Ok(text.to_string())
    }

    async fn attempt_single(&self, prompt: &str) -> Result<VisualizationConfig, AnalysisError> {
        let text = self.complete(prompt, self.settings.max_tokens).await?;
        let value = parse_response(&text, JsonShape::Object)?;
        validate_single(&value)
    }

    async fn attempt_batch(&self, prompt: &str) -> Result<Vec<VisualizationConfig>, AnalysisError> {
        let text = self.complete(prompt, self.settings.max_tokens).await?;
        let value = parse_response(&text, JsonShape::Array)?;
        validate_batch(&value, self.config.max_auto_charts)
    }
}

fn log_fallback(label: &str, error: &AnalysisError) {
    match error {
        AnalysisError::Sample(_) => {
            info!(label, reason = %error, "using fallback chart without model call")
        }
        _ => warn!(label, error = %error, "model pipeline failed, using fallback chart"),
    }
}

/// Keep the first `max` words, marking the cut with an ellipsis.
fn cap_words(text: &str, max: usize) -> String {
    let text = text.trim();
    let mut words = 0;
    let mut in_word = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            in_word = false;
        } else if !in_word {
            in_word = true;
            words += 1;
            if words > max {
                return format!("{}…", text[..i].trim_end());
            }
        }
    }
    text.to_string()
}
