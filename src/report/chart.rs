//! Chart and gauge specifications
//!
//! Plain serializable descriptions of the projection chart and the readiness
//! gauge. The API ships them as JSON for the frontend; the HTML report turns
//! them into an inline Plotly fragment.

use crate::config::{currency_config, format_currency};
use crate::projection::{required_nest_egg, ProjectionRow};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// One line on the projection chart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartTrace {
    pub name: String,
    pub x: Vec<u32>,
    pub y: Vec<f64>,
}

/// Horizontal marker for the required nest egg
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetLine {
    pub y: f64,
    pub label: String,
}

/// The projection chart: balances over age plus the target line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSpec {
    pub traces: Vec<ChartTrace>,
    pub target_line: Option<TargetLine>,
    pub y_label: String,
}

/// Readiness gauge: a score with its band color
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaugeSpec {
    pub score: f64,
    pub color: String,
    pub label: String,
}

/// Gauge band color for a readiness score
pub fn gauge_color(score: f64) -> &'static str {
    if score < 50.0 {
        "red"
    } else if score < 80.0 {
        "#FFC107"
    } else {
        "#00CC96"
    }
}

/// Build the projection chart: real balance, nominal balance, and a target
/// line at the nest egg the 4% rule demands for the target monthly spend.
pub fn build_projection_chart(
    rows: &[ProjectionRow],
    target_monthly_expense: f64,
    currency: &str,
) -> ChartSpec {
    let ages: Vec<u32> = rows.iter().map(|r| r.age).collect();
    let config = currency_config(currency);

    let traces = vec![
        ChartTrace {
            name: "Real (today's money)".to_string(),
            x: ages.clone(),
            y: rows.iter().map(|r| r.real).collect(),
        },
        ChartTrace {
            name: "Nominal".to_string(),
            x: ages,
            y: rows.iter().map(|r| r.nominal).collect(),
        },
    ];

    let target_line = if target_monthly_expense > 0.0 {
        let target = required_nest_egg(target_monthly_expense);
        Some(TargetLine {
            y: target,
            label: format!("Target: {}", format_currency(target, currency)),
        })
    } else {
        None
    };

    ChartSpec {
        traces,
        target_line,
        y_label: format!("Balance ({})", config.symbol),
    }
}

/// Build the readiness gauge for a 0..=100 score.
pub fn build_readiness_gauge(score: f64, label: impl Into<String>) -> GaugeSpec {
    GaugeSpec {
        score,
        color: gauge_color(score).to_string(),
        label: label.into(),
    }
}

/// Render both specs as a self-contained Plotly fragment for the HTML report.
pub fn plotly_fragment(chart: &ChartSpec, gauge: &GaugeSpec) -> String {
    let traces: Vec<serde_json::Value> = chart
        .traces
        .iter()
        .map(|t| {
            json!({
                "type": "scatter",
                "mode": "lines+markers",
                "name": t.name,
                "x": t.x,
                "y": t.y,
            })
        })
        .collect();

    let mut layout = json!({
        "yaxis": { "title": chart.y_label },
        "xaxis": { "title": "Age" },
        "margin": { "t": 24 },
    });
    if let Some(target) = &chart.target_line {
        layout["shapes"] = json!([{
            "type": "line",
            "xref": "paper",
            "x0": 0,
            "x1": 1,
            "y0": target.y,
            "y1": target.y,
            "line": { "dash": "dash", "color": "green" },
        }]);
        layout["annotations"] = json!([{
            "xref": "paper",
            "x": 0.02,
            "y": target.y,
            "text": target.label,
            "showarrow": false,
            "yanchor": "bottom",
        }]);
    }

    let indicator = json!([{
        "type": "indicator",
        "mode": "gauge+number",
        "value": gauge.score,
        "title": { "text": gauge.label },
        "gauge": {
            "axis": { "range": [0, 100] },
            "bar": { "color": gauge.color },
        },
    }]);

    format!(
        "<div id=\"projection-chart\"></div>\n\
         <div id=\"readiness-gauge\"></div>\n\
         <script src=\"https://cdn.plot.ly/plotly-2.32.0.min.js\"></script>\n\
         <script>\n\
         Plotly.newPlot(\"projection-chart\", {traces}, {layout});\n\
         Plotly.newPlot(\"readiness-gauge\", {indicator}, {{}});\n\
         </script>",
        traces = serde_json::Value::Array(traces),
        layout = layout,
        indicator = indicator,
    )
}
