//! Turn parsed model output into validated [`VisualizationConfig`]s.

use serde_json::Value;
use tracing::{debug, warn};

use insight_core::sample::{as_label, as_number};
use insight_core::{ChartData, ChartKind, ResultSource, VisualizationConfig};

use crate::error::AnalysisError;

/// Keys a model may wrap a chart list in instead of returning a bare array.
const WRAPPER_KEYS: &[&str] = &["visualizations", "charts", "items"];

/// Check one candidate and normalize its series lengths.
///
/// Required: `type` ∈ {bar, line, pie, donut}, a non-empty `title`, a
/// string `description`, `data.labels` (scalars) and `data.values`
/// (numbers or numeric strings). Mismatched series are cut to the shorter
/// length; a candidate left with no points is rejected.
pub fn validate_candidate(value: &Value) -> Result<VisualizationConfig, String> {
    let obj = value.as_object().ok_or("candidate is not an object")?;

    let kind: ChartKind = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or("missing field 'type'")?
        .parse()?;

    let title = obj
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or("missing or empty field 'title'")?
        .to_string();

    let description = obj
        .get("description")
        .and_then(Value::as_str)
        .ok_or("missing field 'description'")?
        .trim()
        .to_string();

    let data = obj
        .get("data")
        .and_then(Value::as_object)
        .ok_or("missing field 'data'")?;

    let labels = data
        .get("labels")
        .and_then(Value::as_array)
        .ok_or("missing field 'data.labels'")?
        .iter()
        .map(|l| as_label(l).ok_or_else(|| format!("label {l} is not a scalar")))
        .collect::<Result<Vec<_>, _>>()?;

    let values = data
        .get("values")
        .and_then(Value::as_array)
        .ok_or("missing field 'data.values'")?
        .iter()
        .map(|v| as_number(v).ok_or_else(|| format!("value {v} is not a number")))
        .collect::<Result<Vec<_>, _>>()?;

    let dataset_label = ["datasetLabel", "dataset_label", "label"]
        .iter()
        .find_map(|k| data.get(*k).and_then(Value::as_str))
        .map(str::to_string);

    let mut data = ChartData {
        labels,
        values,
        dataset_label,
    };
    if data.labels.len() != data.values.len() {
        debug!(
            labels = data.labels.len(),
            values = data.values.len(),
            "truncating mismatched chart series"
        );
        data.truncate_to_shorter();
    }
    if data.is_empty() {
        return Err("chart has no data points".to_string());
    }

    Ok(VisualizationConfig {
        kind,
        title,
        description,
        data,
        source: ResultSource::Model,
    })
}

/// Validate a single-chart response. An array reply yields its first valid entry.
pub fn validate_single(value: &Value) -> Result<VisualizationConfig, AnalysisError> {
    match value {
        Value::Array(items) => {
            let mut last_reason = "empty array".to_string();
            for item in items {
                match validate_candidate(item) {
                    Ok(config) => return Ok(config),
                    Err(reason) => last_reason = reason,
                }
            }
            Err(AnalysisError::Validation(last_reason))
        }
        other => validate_candidate(other).map_err(AnalysisError::Validation),
    }
}

/// Validate a batch response, dropping invalid candidates and keeping at
/// most `max` survivors. No survivors is a [`AnalysisError::Validation`]
/// so the caller can fall back.
pub fn validate_batch(
    value: &Value,
    max: usize,
) -> Result<Vec<VisualizationConfig>, AnalysisError> {
    let candidates: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(obj) => match WRAPPER_KEYS
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_array))
        {
            Some(items) => items.iter().collect(),
            None => vec![value],
        },
        _ => Vec::new(),
    };

    let total = candidates.len();
    let survivors: Vec<VisualizationConfig> = candidates
        .into_iter()
        .filter_map(|c| match validate_candidate(c) {
            Ok(config) => Some(config),
            Err(reason) => {
                warn!(reason = %reason, "dropping invalid chart candidate");
                None
            }
        })
        .take(max)
        .collect();

    if survivors.is_empty() {
        return Err(AnalysisError::Validation(format!(
            "none of {total} chart candidates were valid"
        )));
    }
    Ok(survivors)
}
