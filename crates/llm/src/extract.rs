//! Locate and parse the JSON payload inside free-form model output.

use serde_json::Value;
use tracing::debug;

use crate::error::{AnalysisError, JsonShape};
use crate::repair::repair;

/// Slice from the first opening delimiter of `shape` to the last closing one.
pub fn extract_span(text: &str, shape: JsonShape) -> Result<&str, AnalysisError> {
    let (open, close) = shape.delimiters();
    let start = text
        .find(open)
        .ok_or(AnalysisError::Extraction { shape })?;
    let end = text
        .rfind(close)
        .filter(|&end| end > start)
        .ok_or(AnalysisError::Extraction { shape })?;
    Ok(&text[start..=end])
}

/// Extract, repair and parse a JSON value of the given shape.
pub fn parse_json(text: &str, shape: JsonShape) -> Result<Value, AnalysisError> {
    let span = extract_span(text, shape)?;
    let repaired = repair(span);
    serde_json::from_str(&repaired).map_err(|e| {
        debug!(shape = %shape, error = %e, "repaired JSON still invalid");
        AnalysisError::Parse {
            reason: e.to_string(),
            raw_response: text.to_string(),
        }
    })
}

/// Like [`parse_json`], but a batch request whose reply is a lone object
/// (or an object wrapping the list) is accepted as an object.
pub fn parse_response(text: &str, shape: JsonShape) -> Result<Value, AnalysisError> {
    match parse_json(text, shape) {
        Ok(value) => Ok(value),
        Err(err) if shape == JsonShape::Array => {
            parse_json(text, JsonShape::Object).map_err(|_| err)
        }
        Err(err) => Err(err),
    }
}
