use serde_json::{json, Value};

use askdb_core::{QueryResult, ScalarValue};

use crate::spec::{ChartKind, ChartSpec};

/// Dataset fill colors, cycled when a chart needs more than eight.
pub const CHART_COLORS: [&str; 8] = [
    "rgba(54, 162, 235, 0.6)",
    "rgba(255, 99, 132, 0.6)",
    "rgba(255, 206, 86, 0.6)",
    "rgba(75, 192, 192, 0.6)",
    "rgba(153, 102, 255, 0.6)",
    "rgba(255, 159, 64, 0.6)",
    "rgba(99, 255, 132, 0.6)",
    "rgba(201, 203, 207, 0.6)",
];

const BORDER_COLORS: [&str; 8] = [
    "rgba(54, 162, 235, 1)",
    "rgba(255, 99, 132, 1)",
    "rgba(255, 206, 86, 1)",
    "rgba(75, 192, 192, 1)",
    "rgba(153, 102, 255, 1)",
    "rgba(255, 159, 64, 1)",
    "rgba(99, 255, 132, 1)",
    "rgba(201, 203, 207, 1)",
];

/// Render a [`ChartSpec`] over a result into a complete Chart.js
/// configuration object. Returns `Value::Null` for the `Table` hint,
/// which renderers interpret as "no chart".
pub fn chartjs_config(result: &QueryResult, spec: &ChartSpec) -> Value {
    if spec.kind == ChartKind::Table {
        return Value::Null;
    }
    if spec.kind == ChartKind::Scatter {
        return scatter_config(result, spec);
    }

    let label_idx = result.column_index(&spec.label_field);
    let labels: Vec<String> = match label_idx {
        Some(idx) => result.rows.iter().map(|row| row[idx].to_string()).collect(),
        None => (1..=result.rows.len()).map(|n| n.to_string()).collect(),
    };

    let circular = matches!(spec.kind, ChartKind::Pie | ChartKind::Doughnut);
    let datasets: Vec<Value> = spec
        .value_fields
        .iter()
        .enumerate()
        .filter_map(|(series, field)| {
            let idx = result.column_index(field)?;
            let data: Vec<Value> = result.rows.iter().map(|row| numeric_cell(&row[idx])).collect();
            let mut dataset = json!({
                "label": field,
                "data": data,
            });
            if circular {
                // One color per slice rather than per series.
                let fills: Vec<&str> =
                    (0..result.rows.len()).map(|i| CHART_COLORS[i % CHART_COLORS.len()]).collect();
                let borders: Vec<&str> =
                    (0..result.rows.len()).map(|i| BORDER_COLORS[i % BORDER_COLORS.len()]).collect();
                dataset["backgroundColor"] = json!(fills);
                dataset["borderColor"] = json!(borders);
                dataset["borderWidth"] = json!(1);
            } else {
                dataset["backgroundColor"] = json!(CHART_COLORS[series % CHART_COLORS.len()]);
                dataset["borderColor"] = json!(BORDER_COLORS[series % BORDER_COLORS.len()]);
                dataset["borderWidth"] = json!(2);
            }
            if spec.kind == ChartKind::Line {
                dataset["fill"] = json!(false);
                dataset["tension"] = json!(0.4);
                dataset["pointRadius"] = json!(3);
            }
            Some(dataset)
        })
        .collect();

    let chart_type = match spec.kind {
        ChartKind::HorizontalBar => "bar",
        other => other.tag(),
    };

    let mut options = json!({
        "responsive": true,
        "plugins": {
            "title": { "display": !spec.title.is_empty(), "text": spec.title },
            "legend": { "display": circular || datasets.len() > 1 },
        },
    });
    if !circular {
        options["scales"] = json!({ "y": { "beginAtZero": true } });
    }
    if spec.kind == ChartKind::HorizontalBar {
        options["indexAxis"] = json!("y");
        options["scales"] = json!({ "x": { "beginAtZero": true } });
    }

    json!({
        "type": chart_type,
        "data": { "labels": labels, "datasets": datasets },
        "options": options,
    })
}

fn scatter_config(result: &QueryResult, spec: &ChartSpec) -> Value {
    let x_idx = result.column_index(&spec.label_field);
    let y_idx = spec.value_fields.first().and_then(|f| result.column_index(f));
    let points: Vec<Value> = match (x_idx, y_idx) {
        (Some(x), Some(y)) => result
            .rows
            .iter()
            .map(|row| json!({ "x": numeric_cell(&row[x]), "y": numeric_cell(&row[y]) }))
            .collect(),
        _ => Vec::new(),
    };
    let series_label = spec.value_fields.first().cloned().unwrap_or_default();
    json!({
        "type": "scatter",
        "data": {
            "datasets": [{
                "label": series_label,
                "data": points,
                "backgroundColor": CHART_COLORS[0],
                "borderColor": BORDER_COLORS[0],
            }],
        },
        "options": {
            "responsive": true,
            "plugins": {
                "title": { "display": !spec.title.is_empty(), "text": spec.title },
            },
            "scales": {
                "x": { "title": { "display": true, "text": spec.label_field } },
                "y": { "title": { "display": true, "text": series_label }, "beginAtZero": true },
            },
        },
    })
}

fn numeric_cell(value: &ScalarValue) -> Value {
    match value.as_f64() {
        Some(n) => json!(n),
        None => Value::Null,
    }
}
