//! Descriptive statistics fed into prompts and fallback summaries.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::sample::{as_label, as_number, FieldClassification, Record};

/// Number of most frequent values reported per categorical field.
pub const TOP_CATEGORIES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericStats {
    pub field: String,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correlation {
    pub left: String,
    pub right: String,
    pub coefficient: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCounts {
    pub field: String,
    pub distinct: usize,
    /// `(value, count)`, most frequent first.
    pub top: Vec<(String, usize)>,
}

/// Statistics over the listed fields of a record set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSummary {
    pub record_count: usize,
    pub numeric: Vec<NumericStats>,
    pub correlations: Vec<Correlation>,
    pub categorical: Vec<CategoryCounts>,
}

impl StatsSummary {
    pub fn compute(records: &[Record], fields: &FieldClassification) -> Self {
        let numeric = fields
            .numeric
            .iter()
            .filter_map(|f| numeric_stats(records, f))
            .collect();

        let mut correlations = Vec::new();
        for (i, left) in fields.numeric.iter().enumerate() {
            for right in &fields.numeric[i + 1..] {
                if let Some(coefficient) = pearson(records, left, right) {
                    correlations.push(Correlation {
                        left: left.clone(),
                        right: right.clone(),
                        coefficient,
                    });
                }
            }
        }

        let categorical = fields
            .categorical
            .iter()
            .map(|f| category_counts(records, f, TOP_CATEGORIES))
            .collect();

        Self {
            record_count: records.len(),
            numeric,
            correlations,
            categorical,
        }
    }

    /// Plain-text block embedded in prompts.
    pub fn to_prompt_block(&self) -> String {
        let mut out = format!("Records: {}\n", self.record_count);

        if !self.numeric.is_empty() {
            out.push_str("Numeric fields:\n");
            for s in &self.numeric {
                let _ = writeln!(
                    out,
                    "- {}: min={}, max={}, mean={}, median={}, stddev={} (n={})",
                    s.field,
                    fmt_num(s.min),
                    fmt_num(s.max),
                    fmt_num(s.mean),
                    fmt_num(s.median),
                    fmt_num(s.std_dev),
                    s.count
                );
            }
        }

        if !self.correlations.is_empty() {
            out.push_str("Correlations:\n");
            for c in &self.correlations {
                let _ = writeln!(out, "- {} ~ {}: {:.2}", c.left, c.right, c.coefficient);
            }
        }

        if !self.categorical.is_empty() {
            out.push_str("Categorical fields:\n");
            for c in &self.categorical {
                let top: Vec<String> = c
                    .top
                    .iter()
                    .map(|(value, count)| format!("{value} ({count})"))
                    .collect();
                let _ = writeln!(
                    out,
                    "- {}: {} distinct; top: {}",
                    c.field,
                    c.distinct,
                    top.join(", ")
                );
            }
        }

        out
    }
}

/// Format a number compactly: integers without decimals, others to 2 places.
pub fn fmt_num(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v:.2}")
    }
}

fn column(records: &[Record], field: &str) -> Vec<f64> {
    records
        .iter()
        .filter_map(|r| r.get(field))
        .filter_map(as_number)
        .collect()
}

pub fn numeric_stats(records: &[Record], field: &str) -> Option<NumericStats> {
    let mut values = column(records, field);
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);

    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;
    let median = if count % 2 == 0 {
        (values[count / 2 - 1] + values[count / 2]) / 2.0
    } else {
        values[count / 2]
    };
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;

    Some(NumericStats {
        field: field.to_string(),
        count,
        min: values[0],
        max: values[count - 1],
        mean,
        median,
        std_dev: variance.sqrt(),
    })
}

/// Pearson correlation over records where both fields are numeric.
/// `None` with fewer than two pairs or zero variance on either side.
pub fn pearson(records: &[Record], left: &str, right: &str) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = records
        .iter()
        .filter_map(|r| {
            let x = r.get(left).and_then(as_number)?;
            let y = r.get(right).and_then(as_number)?;
            Some((x, y))
        })
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

pub fn category_counts(records: &[Record], field: &str, top_n: usize) -> CategoryCounts {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for label in records
        .iter()
        .filter_map(|r| r.get(field))
        .filter_map(as_label)
        .filter(|l| !l.is_empty())
    {
        let entry = counts.entry(label.clone()).or_insert(0);
        if *entry == 0 {
            order.push(label);
        }
        *entry += 1;
    }

    let distinct = order.len();
    // Stable sort keeps first-appearance order among ties.
    let mut top: Vec<(String, usize)> = order
        .into_iter()
        .map(|value| {
            let count = counts[&value];
            (value, count)
        })
        .collect();
    top.sort_by(|a, b| b.1.cmp(&a.1));
    top.truncate(top_n);

    CategoryCounts {
        field: field.to_string(),
        distinct,
        top,
    }
}
