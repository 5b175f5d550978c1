//! Report building: markdown repair, chart specs, and the HTML report

pub mod chart;
pub mod html;
pub mod markdown;

pub use chart::{
    build_projection_chart, build_readiness_gauge, gauge_color, plotly_fragment, ChartSpec,
    ChartTrace, GaugeSpec, TargetLine,
};
pub use html::{generate_html_report, ReportContext};
pub use markdown::clean_markdown_table;
