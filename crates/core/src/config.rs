use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub ollama: OllamaConfig,
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `INSIGHT_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("INSIGHT_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            llm: LlmConfig::from_env_profiled(p),
            ollama: OllamaConfig::from_env_profiled(p),
            analysis: AnalysisConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:    {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  llm:       provider={}, configured={}",
            self.llm.provider,
            self.llm.is_configured()
        );
        tracing::info!("  ollama:    url={}", self.ollama.url);
        tracing::info!(
            "  analysis:  retries={}, backoff={}ms, cache_capacity={}",
            self.analysis.max_retries,
            self.analysis.initial_backoff_ms,
            self.analysis.cache_capacity
        );
    }

    /// Return a redacted view safe for API responses (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "server": { "host": self.server.host, "port": self.server.port },
            "llm": {
                "provider": self.llm.provider,
                "model": self.llm.active_model(),
                "configured": self.llm.is_configured(),
            },
            "analysis": {
                "max_retries": self.analysis.max_retries,
                "initial_backoff_ms": self.analysis.initial_backoff_ms,
                "max_auto_charts": self.analysis.max_auto_charts,
            },
        })
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub body_limit_mb: usize,
    /// Deadline for one analysis request; past it the fallback result is served.
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_parse(p, "PORT", 3001),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
            body_limit_mb: profiled_env_parse(p, "BODY_LIMIT_MB", 10),
            request_timeout_secs: profiled_env_parse(p, "REQUEST_TIMEOUT_SECS", 60),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ── LLM (OpenAI / Groq / Anthropic / Gemini) ──────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai", "groq", "anthropic", "gemini", "ollama"
    pub provider: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub temperature: f32,
    /// Output token budget for chart requests.
    pub max_tokens: u32,
    /// Output token budget for summaries and answers.
    pub text_max_tokens: u32,
}

impl LlmConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            provider: profiled_env_or(p, "LLM_PROVIDER", "groq"),
            openai_api_key: profiled_env_opt(p, "OPENAI_API_KEY"),
            openai_model: profiled_env_or(p, "OPENAI_MODEL", "gpt-4o-mini"),
            openai_base_url: profiled_env_opt(p, "OPENAI_BASE_URL"),
            groq_api_key: profiled_env_opt(p, "GROQ_API_KEY"),
            groq_model: profiled_env_or(p, "GROQ_MODEL", "llama-3.3-70b-versatile"),
            anthropic_api_key: profiled_env_opt(p, "ANTHROPIC_API_KEY"),
            anthropic_model: profiled_env_or(p, "ANTHROPIC_MODEL", "claude-sonnet-4-5-20250929"),
            gemini_api_key: profiled_env_opt(p, "GEMINI_API_KEY"),
            gemini_model: profiled_env_or(p, "GEMINI_MODEL", "gemini-2.0-flash"),
            temperature: profiled_env_parse(p, "LLM_TEMPERATURE", 0.2),
            max_tokens: profiled_env_parse(p, "LLM_MAX_TOKENS", 2048),
            text_max_tokens: profiled_env_parse(p, "LLM_TEXT_MAX_TOKENS", 600),
        }
    }

    pub fn is_configured(&self) -> bool {
        match self.provider.as_str() {
            "openai" => self.openai_api_key.is_some(),
            "groq" => self.groq_api_key.is_some(),
            "anthropic" | "claude" => self.anthropic_api_key.is_some(),
            "gemini" => self.gemini_api_key.is_some(),
            "ollama" => true,
            _ => false,
        }
    }

    pub fn active_model(&self) -> &str {
        match self.provider.as_str() {
            "openai" => &self.openai_model,
            "groq" => &self.groq_model,
            "anthropic" | "claude" => &self.anthropic_model,
            "gemini" => &self.gemini_model,
            _ => "",
        }
    }
}

// ── Ollama (local models) ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub url: String,
    pub model: String,
}

impl OllamaConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_or(p, "OLLAMA_URL", "http://localhost:11434"),
            model: profiled_env_or(p, "OLLAMA_MODEL", "llama3.2"),
        }
    }
}

// ── Analysis pipeline ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub cache_capacity: usize,
    pub summary_cache_ttl_secs: u64,
    pub answer_cache_ttl_secs: u64,
    pub chart_cache_ttl_secs: u64,
    /// Records included verbatim in summary/answer prompts.
    pub text_sample_size: usize,
    /// Records included verbatim in chart prompts.
    pub chart_sample_size: usize,
    pub max_auto_charts: usize,
    pub max_fallback_charts: usize,
    pub max_chart_points: usize,
    pub max_summary_words: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            cache_capacity: 256,
            summary_cache_ttl_secs: 30 * 60,
            answer_cache_ttl_secs: 5 * 60,
            chart_cache_ttl_secs: 10 * 60,
            text_sample_size: 20,
            chart_sample_size: 10,
            max_auto_charts: 3,
            max_fallback_charts: 5,
            max_chart_points: 8,
            max_summary_words: 300,
        }
    }
}

impl AnalysisConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            max_retries: profiled_env_parse(p, "LLM_MAX_RETRIES", d.max_retries).max(1),
            initial_backoff_ms: profiled_env_parse(
                p,
                "LLM_INITIAL_BACKOFF_MS",
                d.initial_backoff_ms,
            ),
            cache_capacity: profiled_env_parse(p, "CACHE_CAPACITY", d.cache_capacity).max(1),
            summary_cache_ttl_secs: profiled_env_parse(
                p,
                "SUMMARY_CACHE_TTL_SECS",
                d.summary_cache_ttl_secs,
            ),
            answer_cache_ttl_secs: profiled_env_parse(
                p,
                "ANSWER_CACHE_TTL_SECS",
                d.answer_cache_ttl_secs,
            ),
            chart_cache_ttl_secs: profiled_env_parse(
                p,
                "CHART_CACHE_TTL_SECS",
                d.chart_cache_ttl_secs,
            ),
            text_sample_size: profiled_env_parse(p, "TEXT_SAMPLE_SIZE", d.text_sample_size)
                .clamp(5, 20),
            chart_sample_size: profiled_env_parse(p, "CHART_SAMPLE_SIZE", d.chart_sample_size)
                .clamp(5, 20),
            max_auto_charts: profiled_env_parse(p, "MAX_AUTO_CHARTS", d.max_auto_charts)
                .clamp(1, 5),
            max_fallback_charts: profiled_env_parse(
                p,
                "MAX_FALLBACK_CHARTS",
                d.max_fallback_charts,
            )
            .max(1),
            max_chart_points: profiled_env_parse(p, "MAX_CHART_POINTS", d.max_chart_points).max(1),
            max_summary_words: profiled_env_parse(p, "MAX_SUMMARY_WORDS", d.max_summary_words)
                .max(50),
        }
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn summary_ttl(&self) -> Duration {
        Duration::from_secs(self.summary_cache_ttl_secs)
    }

    pub fn answer_ttl(&self) -> Duration {
        Duration::from_secs(self.answer_cache_ttl_secs)
    }

    pub fn chart_ttl(&self) -> Duration {
        Duration::from_secs(self.chart_cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_defaults_match_documented_behavior() {
        let d = AnalysisConfig::default();
        assert_eq!(d.max_retries, 3);
        assert_eq!(d.initial_backoff(), Duration::from_millis(1000));
        assert_eq!(d.max_auto_charts, 3);
        assert_eq!(d.summary_ttl(), Duration::from_secs(1800));
        assert_eq!(d.answer_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn profiled_lookup_prefers_prefixed_key() {
        // Unique key names keep this independent of other tests' env.
        env::set_var("INSIGHT_TEST_KEY_A", "base");
        env::set_var("STAGING_INSIGHT_TEST_KEY_A", "staging");
        assert_eq!(profiled_env_or("STAGING", "INSIGHT_TEST_KEY_A", "x"), "staging");
        assert_eq!(profiled_env_or("", "INSIGHT_TEST_KEY_A", "x"), "base");
        assert_eq!(profiled_env_or("PROD", "INSIGHT_TEST_KEY_A", "x"), "base");
        assert_eq!(profiled_env_or("PROD", "INSIGHT_TEST_MISSING", "x"), "x");
    }

    #[test]
    fn llm_config_reports_configuration() {
        let mut cfg = LlmConfig::from_env_profiled("INSIGHT_UNUSED_PROFILE");
        cfg.provider = "ollama".into();
        assert!(cfg.is_configured());
        cfg.provider = "groq".into();
        cfg.groq_api_key = None;
        assert!(!cfg.is_configured());
        cfg.groq_api_key = Some("k".into());
        assert!(cfg.is_configured());
        assert_eq!(cfg.active_model(), cfg.groq_model);
        cfg.provider = "mystery".into();
        assert!(!cfg.is_configured());
    }
}
