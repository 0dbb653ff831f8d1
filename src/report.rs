use std::fmt::Write;

use chrono::Utc;
use serde_json::{json, Value};

use crate::models::{AlignedChart, ChartSpec};

const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 220.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 70.0;
const Y_TICKS: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct SvgOptions {
    pub width: u32,
    pub height: u32,
}

impl Default for SvgOptions {
    fn default() -> Self {
        SvgOptions {
            width: 960,
            height: 540,
        }
    }
}

pub fn chart_spec(subject: &str, chart: AlignedChart) -> ChartSpec {
    ChartSpec {
        title: format!("% Proficient in {subject}"),
        x_label: "School Year".to_string(),
        y_label: "% Proficient".to_string(),
        chart,
    }
}

/// Vertical range of the plot. Starts at zero and covers at least 0..100.
fn y_range(chart: &AlignedChart) -> (f64, f64) {
    let observed = chart
        .series
        .iter()
        .flat_map(|series| series.values.iter().flatten().copied());
    let (min, max) = observed.fold((0.0_f64, 100.0_f64), |(lo, hi), value| {
        (lo.min(value), hi.max(value))
    });
    ((min / 10.0).floor() * 10.0, (max / 10.0).ceil() * 10.0)
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub fn render_svg(spec: &ChartSpec, options: &SvgOptions) -> String {
    let width = f64::from(options.width);
    let height = f64::from(options.height);
    let plot_width = (width - MARGIN_LEFT - MARGIN_RIGHT).max(1.0);
    let plot_height = (height - MARGIN_TOP - MARGIN_BOTTOM).max(1.0);
    let plot_bottom = MARGIN_TOP + plot_height;
    let plot_right = MARGIN_LEFT + plot_width;

    let chart = &spec.chart;
    let (y_min, y_max) = y_range(chart);
    let y_span = (y_max - y_min).max(f64::EPSILON);
    let y_at = |value: f64| plot_bottom - (value - y_min) / y_span * plot_height;
    let x_at = |index: usize| {
        if chart.axis.len() <= 1 {
            MARGIN_LEFT + plot_width / 2.0
        } else {
            MARGIN_LEFT + index as f64 * plot_width / (chart.axis.len() - 1) as f64
        }
    };

    let mut output = String::new();
    let _ = writeln!(
        output,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">"#,
        w = options.width,
        h = options.height
    );
    let _ = writeln!(
        output,
        r#"<rect x="0" y="0" width="{}" height="{}" fill="white"/>"#,
        options.width, options.height
    );
    let _ = writeln!(
        output,
        r#"<text x="{:.1}" y="28" text-anchor="middle" font-size="18" font-weight="bold">{}</text>"#,
        MARGIN_LEFT + plot_width / 2.0,
        escape(&spec.title)
    );

    // grid and y ticks
    for tick in 0..=Y_TICKS {
        let value = y_min + y_span * tick as f64 / Y_TICKS as f64;
        let y = y_at(value);
        let _ = writeln!(
            output,
            r##"<line x1="{MARGIN_LEFT:.1}" y1="{y:.1}" x2="{plot_right:.1}" y2="{y:.1}" stroke="#e0e0e0"/>"##
        );
        let _ = writeln!(
            output,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="end" font-size="12">{}</text>"#,
            MARGIN_LEFT - 8.0,
            y + 4.0,
            value.round()
        );
    }

    let _ = writeln!(
        output,
        r#"<rect x="{MARGIN_LEFT:.1}" y="{MARGIN_TOP:.1}" width="{plot_width:.1}" height="{plot_height:.1}" fill="none" stroke="black"/>"#
    );

    for (index, period) in chart.axis.iter().enumerate() {
        let _ = writeln!(
            output,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="12">{}</text>"#,
            x_at(index),
            plot_bottom + 18.0,
            period
        );
    }

    let _ = writeln!(
        output,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="14">{}</text>"#,
        MARGIN_LEFT + plot_width / 2.0,
        height - 20.0,
        escape(&spec.x_label)
    );
    let y_label_y = MARGIN_TOP + plot_height / 2.0;
    let _ = writeln!(
        output,
        r#"<text x="20" y="{y_label_y:.1}" text-anchor="middle" font-size="14" transform="rotate(-90 20 {y_label_y:.1})">{}</text>"#,
        escape(&spec.y_label)
    );

    if chart.is_empty() {
        let _ = writeln!(
            output,
            r##"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="14" fill="#666">No data for this selection</text>"##,
            MARGIN_LEFT + plot_width / 2.0,
            MARGIN_TOP + plot_height / 2.0
        );
    }

    for (series_index, series) in chart.series.iter().enumerate() {
        let color = PALETTE[series_index % PALETTE.len()];

        // A gap ends the current run; runs are never joined across a gap.
        let mut runs: Vec<Vec<(f64, f64)>> = Vec::new();
        let mut current: Vec<(f64, f64)> = Vec::new();
        for (index, value) in series.values.iter().enumerate() {
            match value {
                Some(value) => current.push((x_at(index), y_at(*value))),
                None if !current.is_empty() => runs.push(std::mem::take(&mut current)),
                None => {}
            }
        }
        if !current.is_empty() {
            runs.push(current);
        }

        for run in &runs {
            if run.len() > 1 {
                let points = run
                    .iter()
                    .map(|(x, y)| format!("{x:.1},{y:.1}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                let _ = writeln!(
                    output,
                    r#"<polyline points="{points}" fill="none" stroke="{color}" stroke-width="2"/>"#
                );
            }
            for (x, y) in run {
                let _ = writeln!(
                    output,
                    r#"<circle cx="{x:.1}" cy="{y:.1}" r="3.5" fill="{color}"/>"#
                );
            }
        }

        let legend_x = plot_right + 20.0;
        let legend_y = MARGIN_TOP + 10.0 + series_index as f64 * 22.0;
        let _ = writeln!(
            output,
            r#"<rect x="{legend_x:.1}" y="{:.1}" width="14" height="14" fill="{color}"/>"#,
            legend_y - 11.0
        );
        let _ = writeln!(
            output,
            r#"<text x="{:.1}" y="{legend_y:.1}" font-size="12">{}</text>"#,
            legend_x + 20.0,
            escape(&series.label)
        );
    }

    output.push_str("</svg>\n");
    output
}

/// Chart data in the labels/datasets shape line-chart widgets consume.
pub fn render_json(spec: &ChartSpec) -> Value {
    json!({
        "title": spec.title,
        "xLabel": spec.x_label,
        "yLabel": spec.y_label,
        "generatedAt": Utc::now().to_rfc3339(),
        "labels": spec.chart.axis,
        "datasets": spec.chart.series,
    })
}

pub fn render_markdown(spec: &ChartSpec) -> String {
    let chart = &spec.chart;
    let mut output = String::new();

    let _ = writeln!(output, "# {}", spec.title);
    let _ = writeln!(output);

    if chart.is_empty() {
        let _ = writeln!(output, "No data for this selection.");
        return output;
    }

    let header = chart
        .series
        .iter()
        .map(|series| series.label.replace('|', "\\|"))
        .collect::<Vec<_>>()
        .join(" | ");
    let _ = writeln!(output, "| {} | {} |", spec.x_label, header);
    let _ = writeln!(
        output,
        "|---|{}",
        "---:|".repeat(chart.series.len())
    );

    for (index, period) in chart.axis.iter().enumerate() {
        let cells = chart
            .series
            .iter()
            .map(|series| match series.values.get(index).copied().flatten() {
                Some(value) => format!("{value:.1}"),
                None => "-".to_string(),
            })
            .collect::<Vec<_>>()
            .join(" | ");
        let _ = writeln!(output, "| {} | {} |", period, cells);
    }

    output
}
