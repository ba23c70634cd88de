use std::borrow::Cow;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SampleError;

/// A flat record: field name → scalar value, in upload column order.
pub type Record = Map<String, Value>;

/// Tabular data supplied by the caller.
///
/// Arrives either as an ordered list of flat records or as one nested
/// mapping (e.g. an API payload wrapping its rows). The core never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DataSample {
    Records(Vec<Record>),
    Nested(Record),
}

impl DataSample {
    /// The records to analyse.
    ///
    /// For a nested mapping the first member holding a non-empty array of
    /// objects wins (`{"rows": [...]}`); otherwise the mapping itself is
    /// flattened into a single record with dotted keys.
    pub fn records(&self) -> Cow<'_, [Record]> {
        match self {
            DataSample::Records(records) => Cow::Borrowed(records.as_slice()),
            DataSample::Nested(map) => {
                for value in map.values() {
                    if let Some(rows) = value.as_array() {
                        if !rows.is_empty() && rows.iter().all(Value::is_object) {
                            let records = rows
                                .iter()
                                .filter_map(|r| r.as_object().cloned())
                                .collect();
                            return Cow::Owned(records);
                        }
                    }
                }

                let mut flat = Record::new();
                flatten_into(&mut flat, "", map);
                if flat.is_empty() {
                    Cow::Owned(Vec::new())
                } else {
                    Cow::Owned(vec![flat])
                }
            }
        }
    }
}

fn flatten_into(out: &mut Record, prefix: &str, map: &Record) {
    for (key, value) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) => flatten_into(out, &name, inner),
            Value::Array(_) => {}
            scalar => {
                out.insert(name, scalar.clone());
            }
        }
    }
}

/// Coerce a scalar to a finite number.
///
/// JSON numbers pass through; strings are trimmed and parsed. Empty
/// strings, booleans and nulls are never numeric.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

/// Render a scalar as a chart label. Objects, arrays and nulls have no label.
pub fn as_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Field names partitioned by what they can be charted as.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldClassification {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
}

impl FieldClassification {
    /// Classify every field seen across `records`, in first-seen order.
    ///
    /// Numeric: every present value coerces to a finite number, with at
    /// least one present. Categorical: not numeric, holds at least one
    /// non-empty string and nothing nested. Missing cells (null or blank)
    /// are ignored.
    pub fn classify(records: &[Record]) -> Self {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for record in records {
            for key in record.keys() {
                if seen.insert(key.as_str()) {
                    names.push(key.clone());
                }
            }
        }

        let mut out = FieldClassification::default();
        for name in names {
            let mut present = 0usize;
            let mut all_numeric = true;
            let mut has_string = false;
            let mut nested = false;

            for value in records.iter().filter_map(|r| r.get(&name)) {
                if is_missing(value) {
                    continue;
                }
                present += 1;
                if matches!(value, Value::Object(_) | Value::Array(_)) {
                    nested = true;
                }
                if value.is_string() {
                    has_string = true;
                }
                if as_number(value).is_none() {
                    all_numeric = false;
                }
            }

            if present == 0 || nested {
                continue;
            }
            if all_numeric {
                out.numeric.push(name);
            } else if has_string {
                out.categorical.push(name);
            }
        }
        out
    }

    pub fn is_chartable(&self) -> bool {
        !self.numeric.is_empty() && !self.categorical.is_empty()
    }

    pub fn require_chartable(&self) -> Result<(), SampleError> {
        if self.is_chartable() {
            Ok(())
        } else {
            Err(SampleError::NoChartableFields {
                numeric: self.numeric.len(),
                categorical: self.categorical.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(value: Value) -> DataSample {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn records_variant_keeps_order() {
        let data = sample(json!([
            {"region": "A", "cases": 10},
            {"region": "B", "cases": 20}
        ]));
        let records = data.records();
        assert_eq!(records.len(), 2);
        let keys: Vec<&String> = records[0].keys().collect();
        assert_eq!(keys, ["region", "cases"]);
    }

    #[test]
    fn nested_mapping_uses_first_record_array() {
        let data = sample(json!({
            "meta": {"source": "upload"},
            "rows": [{"district": "North", "deaths": "4"}]
        }));
        assert!(matches!(data, DataSample::Nested(_)));
        let records = data.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["district"], "North");
    }

    #[test]
    fn nested_mapping_without_rows_flattens() {
        let data = sample(json!({"site": "X", "totals": {"cases": 5, "deaths": 1}}));
        let records = data.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["totals.cases"], 5);
        assert_eq!(records[0]["site"], "X");
    }

    #[test]
    fn number_coercion() {
        assert_eq!(as_number(&json!(3)), Some(3.0));
        assert_eq!(as_number(&json!(" 2.5 ")), Some(2.5));
        assert_eq!(as_number(&json!("")), None);
        assert_eq!(as_number(&json!("abc")), None);
        assert_eq!(as_number(&json!("NaN")), None);
        assert_eq!(as_number(&json!(true)), None);
        assert_eq!(as_number(&Value::Null), None);
    }

    #[test]
    fn classify_partitions_fields() {
        let data = sample(json!([
            {"region": "A", "cases": "10", "year": 2020, "flag": true},
            {"region": "B", "cases": 20, "year": 2021, "flag": false},
            {"region": "C", "cases": "", "year": 2022, "flag": true}
        ]));
        let fields = FieldClassification::classify(&data.records());
        assert_eq!(fields.numeric, ["cases", "year"]);
        assert_eq!(fields.categorical, ["region"]);
        assert!(fields.is_chartable());
    }

    #[test]
    fn mixed_field_is_categorical() {
        let data = sample(json!([{"code": "A1"}, {"code": 7}]));
        let fields = FieldClassification::classify(&data.records());
        assert!(fields.numeric.is_empty());
        assert_eq!(fields.categorical, ["code"]);
    }

    #[test]
    fn numeric_only_is_not_chartable() {
        let data = sample(json!([{"a": 1, "b": 2}]));
        let fields = FieldClassification::classify(&data.records());
        assert_eq!(
            fields.require_chartable(),
            Err(SampleError::NoChartableFields { numeric: 2, categorical: 0 })
        );
    }
}
