//! Deterministic results derived straight from the data when the model
//! pipeline gives up. Nothing here can fail.

use chrono::{DateTime, NaiveDate};

use insight_core::sample::{as_label, as_number};
use insight_core::stats::{fmt_num, numeric_stats};
use insight_core::{
    ChartData, ChartKind, FieldClassification, Narrative, Record, ResultSource, VisualizationConfig,
};

/// Placeholder label used when the data has nothing chartable.
pub const NO_DATA_LABEL: &str = "No data";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y"];

/// Up to `max_charts` charts, one per (categorical, numeric) pair in field
/// order, each with at most `max_points` categories.
pub fn fallback_visualizations(
    records: &[Record],
    max_charts: usize,
    max_points: usize,
) -> Vec<VisualizationConfig> {
    let fields = FieldClassification::classify(records);
    fields
        .categorical
        .iter()
        .flat_map(|cat| fields.numeric.iter().map(move |num| (cat, num)))
        .take(max_charts)
        .enumerate()
        .filter_map(|(index, (cat, num))| {
            let data = aggregate(records, cat, num, max_points)?;
            let kind = heuristic_kind(&data.labels, index);
            Some(chart(kind, cat, num, data))
        })
        .collect()
}

/// One chart for a free-text request.
///
/// Chart kind and field names mentioned in `request` win ("bar chart of
/// cases by region"); otherwise the first field pair with its heuristic
/// kind, then per-field totals, then a one-bar placeholder.
pub fn fallback_visualization(
    request: &str,
    records: &[Record],
    max_points: usize,
) -> VisualizationConfig {
    let fields = FieldClassification::classify(records);
    let words = words(request);
    let requested_kind = words.iter().find_map(|w| parse_kind_word(w));

    if fields.is_chartable() {
        let num = mentioned(request, &fields.numeric).unwrap_or(&fields.numeric[0]);
        let cat = mentioned(request, &fields.categorical).unwrap_or(&fields.categorical[0]);
        if let Some(data) = aggregate(records, cat, num, max_points) {
            let kind = requested_kind.unwrap_or_else(|| heuristic_kind(&data.labels, 0));
            return chart(kind, cat, num, data);
        }
    }

    if let Some(data) = field_totals(records, &fields.numeric, max_points) {
        return VisualizationConfig {
            kind: requested_kind.unwrap_or(ChartKind::Bar),
            title: "Totals by Field".to_string(),
            description: format!(
                "Sum of each numeric field across {} records, computed directly from the data.",
                records.len()
            ),
            data,
            source: ResultSource::Fallback,
        };
    }

    VisualizationConfig {
        kind: ChartKind::Bar,
        title: NO_DATA_LABEL.to_string(),
        description: "The data has no numeric fields to chart.".to_string(),
        data: ChartData {
            labels: vec![NO_DATA_LABEL.to_string()],
            values: vec![0.0],
            dataset_label: None,
        },
        source: ResultSource::Fallback,
    }
}

/// Apologetic notice followed by a plain overview of the data.
pub fn fallback_summary(records: &[Record]) -> Narrative {
    let fields = FieldClassification::classify(records);
    let mut text = String::from(
        "The AI summary is unavailable right now, so here is a basic overview of the data instead.\n\n",
    );
    text.push_str(&format!("The dataset contains {} records.", records.len()));
    if !fields.numeric.is_empty() {
        text.push_str(&format!(" Numeric fields: {}.", fields.numeric.join(", ")));
    }
    if !fields.categorical.is_empty() {
        text.push_str(&format!(" Categorical fields: {}.", fields.categorical.join(", ")));
    }
    for stats in fields.numeric.iter().filter_map(|f| numeric_stats(records, f)) {
        text.push_str(&format!(
            " {} ranges from {} to {} (mean {}).",
            stats.field,
            fmt_num(stats.min),
            fmt_num(stats.max),
            fmt_num(stats.mean)
        ));
    }
    Narrative {
        text,
        source: ResultSource::Fallback,
    }
}

pub fn fallback_answer(question: &str) -> Narrative {
    let question = question.trim();
    let text = if question.is_empty() {
        "Sorry, I couldn't answer that right now. Please try again in a moment.".to_string()
    } else {
        format!("Sorry, I couldn't answer \"{question}\" right now. Please try again in a moment.")
    };
    Narrative {
        text,
        source: ResultSource::Fallback,
    }
}

/// Sum `num` per distinct `cat` value, first-seen order, capped at `max_points`.
fn aggregate(records: &[Record], cat: &str, num: &str, max_points: usize) -> Option<ChartData> {
    let mut labels: Vec<String> = Vec::new();
    let mut values: Vec<f64> = Vec::new();

    for record in records {
        let Some(label) = record.get(cat).and_then(as_label).filter(|l| !l.is_empty()) else {
            continue;
        };
        let amount = record.get(num).and_then(as_number).unwrap_or(0.0);
        match labels.iter().position(|l| *l == label) {
            Some(i) => values[i] += amount,
            None if labels.len() < max_points => {
                labels.push(label);
                values.push(amount);
            }
            None => {}
        }
    }

    if labels.is_empty() {
        return None;
    }
    Some(ChartData {
        labels,
        values,
        dataset_label: Some(num.to_string()),
    })
}

fn field_totals(records: &[Record], numeric: &[String], max_points: usize) -> Option<ChartData> {
    if numeric.is_empty() {
        return None;
    }
    let fields = &numeric[..numeric.len().min(max_points.max(1))];
    let values = fields
        .iter()
        .map(|f| {
            records
                .iter()
                .filter_map(|r| r.get(f).and_then(as_number))
                .sum::<f64>()
        })
        .collect();
    Some(ChartData {
        labels: fields.to_vec(),
        values,
        dataset_label: Some("Total".to_string()),
    })
}

fn heuristic_kind(labels: &[String], index: usize) -> ChartKind {
    if !labels.is_empty() && labels.iter().all(|l| looks_temporal(l)) {
        ChartKind::Line
    } else if labels.len() <= 5 {
        if index % 2 == 0 {
            ChartKind::Pie
        } else {
            ChartKind::Donut
        }
    } else {
        ChartKind::Bar
    }
}

/// A four-digit year, a calendar date, a year-month or an RFC 3339 timestamp.
fn looks_temporal(label: &str) -> bool {
    let label = label.trim();
    if label.len() == 4 && label.bytes().all(|b| b.is_ascii_digit()) {
        return matches!(label.parse::<u16>(), Ok(1800..=2200));
    }
    DATE_FORMATS
        .iter()
        .any(|fmt| NaiveDate::parse_from_str(label, fmt).is_ok())
        || NaiveDate::parse_from_str(&format!("{label}-01"), "%Y-%m-%d").is_ok()
        || DateTime::parse_from_rfc3339(label).is_ok()
}

fn chart(kind: ChartKind, cat: &str, num: &str, data: ChartData) -> VisualizationConfig {
    VisualizationConfig {
        kind,
        title: format!("{} by {}", humanize(num), humanize(cat)),
        description: format!(
            "Total {num} for each of {} {cat} values, computed directly from the data.",
            data.len()
        ),
        data,
        source: ResultSource::Fallback,
    }
}

/// `total_cases` → `Total Cases`.
fn humanize(field: &str) -> String {
    field
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn parse_kind_word(word: &str) -> Option<ChartKind> {
    word.parse()
        .ok()
        .or_else(|| word.strip_suffix('s').and_then(|w| w.parse().ok()))
}

/// First field whose name (or its spaced form) appears in `request`.
/// Longer names are tried first so `total_cases` beats `cases`.
fn mentioned<'a>(request: &str, fields: &'a [String]) -> Option<&'a String> {
    let haystack = format!(" {} ", words(request).join(" "));
    let mut candidates: Vec<&String> = fields.iter().collect();
    candidates.sort_by_key(|f| std::cmp::Reverse(f.len()));
    candidates.into_iter().find(|field| {
        let needle = words(field).join(" ");
        !needle.is_empty() && haystack.contains(&format!(" {needle} "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: serde_json::Value) -> Vec<Record> {
        serde_json::from_value(value).unwrap()
    }

    fn regions() -> Vec<Record> {
        records(json!([
            {"region": "A", "cases": 10},
            {"region": "B", "cases": 20},
            {"region": "C", "cases": 5}
        ]))
    }

    #[test]
    fn requested_bar_chart_of_cases_by_region() {
        let config = fallback_visualization("show a bar chart of cases by region", &regions(), 8);
        assert_eq!(config.kind, ChartKind::Bar);
        assert_eq!(config.data.labels, ["A", "B", "C"]);
        assert_eq!(config.data.values, [10.0, 20.0, 5.0]);
        assert_eq!(config.title, "Cases by Region");
        assert_eq!(config.source, ResultSource::Fallback);
    }

    #[test]
    fn sums_per_category_in_first_seen_order() {
        let data = records(json!([
            {"district": "North", "deaths": 1, "cases": "4"},
            {"district": "South", "deaths": 2, "cases": 6},
            {"district": "North", "deaths": 3, "cases": null}
        ]));
        let charts = fallback_visualizations(&data, 5, 8);
        assert_eq!(charts.len(), 2);
        assert_eq!(charts[0].data.labels, ["North", "South"]);
        assert_eq!(charts[0].data.values, [4.0, 2.0]);
        assert_eq!(charts[0].kind, ChartKind::Pie);
        assert_eq!(charts[1].data.values, [4.0, 6.0]);
        assert_eq!(charts[1].kind, ChartKind::Donut);
    }

    #[test]
    fn many_categories_become_capped_bar() {
        let rows: Vec<_> = (0..12)
            .map(|i| json!({"facility": format!("F{i}"), "patients": i}))
            .collect();
        let charts = fallback_visualizations(&records(json!(rows)), 5, 8);
        assert_eq!(charts[0].kind, ChartKind::Bar);
        assert_eq!(charts[0].data.len(), 8);
        assert_eq!(charts[0].data.labels.len(), charts[0].data.values.len());
    }

    #[test]
    fn dates_become_line_charts() {
        let data = records(json!([
            {"month": "2024-01", "cases": 3},
            {"month": "2024-02", "cases": 5}
        ]));
        assert_eq!(fallback_visualizations(&data, 5, 8)[0].kind, ChartKind::Line);

        assert!(looks_temporal("2019"));
        assert!(looks_temporal("2024-03-15"));
        assert!(looks_temporal("15/03/2024"));
        assert!(!looks_temporal("North"));
        assert!(!looks_temporal("0042"));
    }

    #[test]
    fn caps_combinations() {
        let data = records(json!([{"a": "x", "b": "y", "c": "z", "n1": 1, "n2": 2, "n3": 3}]));
        assert_eq!(fallback_visualizations(&data, 5, 8).len(), 5);
        assert_eq!(fallback_visualizations(&data, 2, 8).len(), 2);
    }

    #[test]
    fn no_pair_means_no_auto_charts() {
        let data = records(json!([{"cases": 1, "deaths": 2}]));
        assert!(fallback_visualizations(&data, 5, 8).is_empty());
    }

    #[test]
    fn single_fallback_degrades_to_totals_then_placeholder() {
        let numeric_only = records(json!([{"cases": 1, "deaths": 2}, {"cases": 3, "deaths": 4}]));
        let config = fallback_visualization("anything", &numeric_only, 8);
        assert_eq!(config.data.labels, ["cases", "deaths"]);
        assert_eq!(config.data.values, [4.0, 6.0]);

        let config = fallback_visualization("pie please", &[], 8);
        assert_eq!(config.data.labels, [NO_DATA_LABEL]);
        assert_eq!(config.data.values.len(), 1);
    }

    #[test]
    fn unnamed_request_uses_first_pair() {
        let config = fallback_visualization("something useful", &regions(), 8);
        assert_eq!(config.kind, ChartKind::Pie);
        assert_eq!(config.data.labels, ["A", "B", "C"]);
    }

    #[test]
    fn longer_field_name_wins() {
        let data = records(json!([{"region": "A", "cases": 1, "total_cases": 9}]));
        let config = fallback_visualization("line of total cases per region", &data, 8);
        assert_eq!(config.kind, ChartKind::Line);
        assert_eq!(config.data.values, [9.0]);
    }

    #[test]
    fn narratives_are_tagged_fallback() {
        let summary = fallback_summary(&regions());
        assert!(summary.text.contains("3 records"));
        assert!(summary.text.contains("cases ranges from 5 to 20"));
        assert_eq!(summary.source, ResultSource::Fallback);

        let answer = fallback_answer("Which region is worst?");
        assert!(answer.text.contains("Which region is worst?"));
        assert_eq!(answer.source, ResultSource::Fallback);
    }
}
