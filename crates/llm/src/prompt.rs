//! Prompt construction from a data sample.
//!
//! Templates live in `prompts/*.md` and are embedded at compile time. Each
//! `<<<name>>>` placeholder must be supplied when rendering.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use insight_core::{DataSample, FieldClassification, Record, SampleError, StatsSummary};

use crate::error::AnalysisError;

const SUMMARY_TEMPLATE: &str = include_str!("../prompts/summary.md");
const ANSWER_TEMPLATE: &str = include_str!("../prompts/answer.md");
const VISUALIZATION_TEMPLATE: &str = include_str!("../prompts/visualization.md");
const AUTO_VISUALIZATION_TEMPLATE: &str = include_str!("../prompts/auto_visualization.md");

/// Field lists in prompts are capped per kind.
pub const MAX_PROMPT_FIELDS: usize = 3;

const HEALTH_TERMS: &[&str] = &[
    "case", "death", "patient", "facility", "district", "malaria", "vaccin", "immuni", "clinic",
    "hospital", "disease", "diagnos", "mortality", "birth", "admission", "outbreak", "dose",
];

const HEALTH_HINT: &str = "This looks like health data (disease cases, facilities or districts). \
Use public-health language where it fits and avoid clinical advice.";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<<<([a-z_]+)>>>").expect("placeholder pattern is valid"));

/// Everything a prompt needs to know about one data sample.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub sample: Vec<Record>,
    pub record_count: usize,
    /// Capped at [`MAX_PROMPT_FIELDS`] per kind.
    pub fields: FieldClassification,
    pub domain_hint: Option<&'static str>,
    /// Computed over every record, not only the sample.
    pub stats: StatsSummary,
}

impl PromptContext {
    pub fn build(data: &DataSample, sample_cap: usize) -> Result<Self, AnalysisError> {
        let records = data.records();
        if records.is_empty() {
            return Err(SampleError::Empty.into());
        }

        let all = FieldClassification::classify(&records);
        let domain_hint = detect_domain(&all);
        let fields = FieldClassification {
            numeric: all.numeric.into_iter().take(MAX_PROMPT_FIELDS).collect(),
            categorical: all.categorical.into_iter().take(MAX_PROMPT_FIELDS).collect(),
        };
        let stats = StatsSummary::compute(&records, &fields);

        Ok(Self {
            sample: records.iter().take(sample_cap.max(1)).cloned().collect(),
            record_count: records.len(),
            fields,
            domain_hint,
            stats,
        })
    }

    fn common_vars(&self) -> Result<Vars, AnalysisError> {
        let sample = serde_json::to_string_pretty(&self.sample)
            .map_err(|e| AnalysisError::Prompt(format!("failed to serialize sample: {e}")))?;
        let mut vars = Vars::new();
        vars.insert("domain_hint", self.domain_hint.unwrap_or_default().to_string());
        vars.insert("stats", self.stats.to_prompt_block());
        vars.insert("sample", sample);
        vars.insert("sample_count", self.sample.len().to_string());
        vars.insert("record_count", self.record_count.to_string());
        vars.insert("numeric_fields", field_list(&self.fields.numeric));
        vars.insert("categorical_fields", field_list(&self.fields.categorical));
        Ok(vars)
    }
}

type Vars = HashMap<&'static str, String>;

fn field_list(fields: &[String]) -> String {
    if fields.is_empty() {
        "(none)".to_string()
    } else {
        fields.join(", ")
    }
}

fn detect_domain(fields: &FieldClassification) -> Option<&'static str> {
    fields
        .numeric
        .iter()
        .chain(&fields.categorical)
        .map(|f| f.to_lowercase())
        .any(|f| HEALTH_TERMS.iter().any(|term| f.contains(term)))
        .then_some(HEALTH_HINT)
}

/// Substitute every `<<<name>>>` in one pass. A placeholder with no value
/// is an error; placeholder-like text inside substituted values is left alone.
pub fn render_template(
    template: &str,
    vars: &HashMap<&str, String>,
) -> Result<String, AnalysisError> {
    if let Some(missing) = PLACEHOLDER
        .captures_iter(template)
        .map(|c| c[1].to_string())
        .find(|name| !vars.contains_key(name.as_str()))
    {
        return Err(AnalysisError::Prompt(format!("no value for placeholder <<<{missing}>>>")));
    }
    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        vars.get(&caps[1]).cloned().unwrap_or_default()
    });
    Ok(rendered.trim().to_string())
}

pub fn summary_prompt(ctx: &PromptContext, max_words: usize) -> Result<String, AnalysisError> {
    let mut vars = ctx.common_vars()?;
    vars.insert("max_words", max_words.to_string());
    render_template(SUMMARY_TEMPLATE, &vars)
}

pub fn answer_prompt(
    ctx: &PromptContext,
    question: &str,
    max_words: usize,
) -> Result<String, AnalysisError> {
    let mut vars = ctx.common_vars()?;
    vars.insert("question", question.trim().to_string());
    vars.insert("max_words", max_words.to_string());
    render_template(ANSWER_TEMPLATE, &vars)
}

/// Requires at least one numeric and one categorical field.
pub fn visualization_prompt(
    ctx: &PromptContext,
    request: &str,
    max_points: usize,
) -> Result<String, AnalysisError> {
    ctx.fields.require_chartable()?;
    let mut vars = ctx.common_vars()?;
    vars.insert("request", request.trim().to_string());
    vars.insert("max_points", max_points.to_string());
    render_template(VISUALIZATION_TEMPLATE, &vars)
}

/// Requires at least one numeric and one categorical field.
pub fn auto_visualization_prompt(
    ctx: &PromptContext,
    max_charts: usize,
    max_points: usize,
) -> Result<String, AnalysisError> {
    ctx.fields.require_chartable()?;
    let mut vars = ctx.common_vars()?;
    vars.insert("max_charts", max_charts.to_string());
    vars.insert("max_points", max_points.to_string());
    render_template(AUTO_VISUALIZATION_TEMPLATE, &vars)
}
