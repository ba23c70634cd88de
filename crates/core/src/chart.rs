use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Chart kinds the dashboard knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Donut,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
            ChartKind::Donut => "donut",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bar" => Ok(ChartKind::Bar),
            "line" => Ok(ChartKind::Line),
            "pie" => Ok(ChartKind::Pie),
            "donut" | "doughnut" => Ok(ChartKind::Donut),
            other => Err(format!("unknown chart type '{other}'")),
        }
    }
}

/// Whether a result came from the model or was derived directly from the data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    #[default]
    Model,
    Fallback,
}

/// Parallel label/value series. `labels.len() == values.len()` always holds
/// for data that left the validator or the fallback generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_label: Option<String>,
}

impl ChartData {
    pub fn len(&self) -> usize {
        self.labels.len().min(self.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cut both series to the shorter length, keeping order. Never pads.
    pub fn truncate_to_shorter(&mut self) {
        let n = self.len();
        self.labels.truncate(n);
        self.values.truncate(n);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationConfig {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub title: String,
    pub description: String,
    pub data: ChartData,
    #[serde(default)]
    pub source: ResultSource,
}

/// Natural-language output of `summarize` / `answer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub text: String,
    pub source: ResultSource,
}

/// Printable report: a summary plus the charts shown under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub summary: Narrative,
    pub charts: Vec<VisualizationConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_kind_parses_aliases() {
        assert_eq!("Doughnut".parse::<ChartKind>().unwrap(), ChartKind::Donut);
        assert_eq!(" BAR ".parse::<ChartKind>().unwrap(), ChartKind::Bar);
        assert!("scatter".parse::<ChartKind>().is_err());
    }

    #[test]
    fn truncation_keeps_prefix() {
        let mut data = ChartData {
            labels: vec!["x".into(), "y".into(), "z".into()],
            values: vec![1.0, 2.0],
            dataset_label: None,
        };
        data.truncate_to_shorter();
        assert_eq!(data.labels, ["x", "y"]);
        assert_eq!(data.values, [1.0, 2.0]);
    }

    #[test]
    fn serializes_with_type_key() {
        let config = VisualizationConfig {
            kind: ChartKind::Pie,
            title: "T".into(),
            description: "D".into(),
            data: ChartData {
                labels: vec!["a".into()],
                values: vec![1.0],
                dataset_label: Some("Cases".into()),
            },
            source: ResultSource::Fallback,
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["type"], "pie");
        assert_eq!(json["data"]["datasetLabel"], "Cases");
        assert_eq!(json["source"], "fallback");
    }
}
