//! 用 plotters 画折线图或柱状图，按文件后缀输出 PNG 或 SVG。

use std::fmt::Display;
use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::info;

use crate::config::WATERMARK;
use crate::transform::{Axis, Column, Metric, PlotSeries, TransformOptions};
use crate::SeriesTable;

const SIZE: (u32, u32) = (1280, 720);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChartKind {
    #[default]
    Line,
    Bar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub kind: ChartKind,
    pub log_scale: bool,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
}

impl Chart {
    pub fn for_plot(
        options: &TransformOptions,
        kind: ChartKind,
        log_scale: bool,
        as_of: Option<NaiveDate>,
    ) -> Self {
        let subject = match options.metric {
            Metric::Cases => "Confirmed cases",
            Metric::Deaths => "Deaths",
        };
        let x_label = if options.align_to_first_death {
            match options.metric {
                Metric::Cases => "Days since first case",
                Metric::Deaths => "Days since first death",
            }
        } else {
            "Date"
        };
        Self {
            kind,
            log_scale,
            title: title(subject, as_of),
            x_label: x_label.to_string(),
            y_label: y_label(options, log_scale),
        }
    }

    pub fn for_fatality(as_of: Option<NaiveDate>) -> Self {
        Self {
            kind: ChartKind::Line,
            log_scale: false,
            title: title("Fatality rate", as_of),
            x_label: "Date".to_string(),
            y_label: "Deaths per confirmed case (%)".to_string(),
        }
    }
}

pub fn y_label(options: &TransformOptions, log_scale: bool) -> String {
    let metric = match options.metric {
        Metric::Cases => "confirmed cases",
        Metric::Deaths => "deaths",
    };
    let mut label = if options.cumulative {
        format!("Number of {}", metric)
    } else {
        format!("Number of new {}", metric)
    };
    if options.per_capita {
        label.push_str(" per capita");
    }
    if log_scale {
        label.push_str(" (log scale)");
    }
    label
}

fn title(subject: &str, as_of: Option<NaiveDate>) -> String {
    match as_of {
        Some(date) => format!("{} per country as of {}", subject, date),
        None => format!("{} per country", subject),
    }
}

/// 图上实际要画的点：(行号, 值)。对数坐标下先取 log10，并丢掉非正数
pub fn points(column: &Column, log_scale: bool) -> Vec<(f64, f64)> {
    column
        .values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| {
            let v = (*v)?;
            if !log_scale {
                Some((i as f64, v))
            } else if v > 0.0 {
                Some((i as f64, v.log10()))
            } else {
                None
            }
        })
        .collect()
}

pub fn render(series: &PlotSeries, chart: &Chart, path: &Path) -> Result<()> {
    let is_svg = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("svg"));
    if is_svg {
        draw(SVGBackend::new(path, SIZE).into_drawing_area(), series, chart)?;
    } else {
        draw(BitMapBackend::new(path, SIZE).into_drawing_area(), series, chart)?;
    }
    info!("chart written to {}", path.display());
    Ok(())
}

/// 在终端打印表格
pub fn print_table<W: Write>(series: &PlotSeries, mut out: W) -> Result<()> {
    let table = SeriesTable::try_from(series)?;
    writeln!(out, "{}", *table)?;
    Ok(())
}

fn render_err<E: Display>(e: E) -> anyhow::Error {
    anyhow!("chart rendering failed: {}", e)
}

fn draw<DB: DrawingBackend>(
    root: DrawingArea<DB, Shift>,
    series: &PlotSeries,
    chart: &Chart,
) -> Result<()> {
    root.fill(&WHITE).map_err(render_err)?;

    let plotted: Vec<Vec<(f64, f64)>> = series
        .columns
        .iter()
        .map(|c| points(c, chart.log_scale))
        .collect();
    let (y_min, y_max) = y_bounds(&plotted, chart);
    let rows = series.len().max(1) as f64;
    let x_range = match chart.kind {
        ChartKind::Line => 0f64..(rows - 1.0).max(1.0),
        ChartKind::Bar => -0.5f64..rows - 0.5,
    };

    let mut ctx = ChartBuilder::on(&root)
        .caption(chart.title.as_str(), ("sans-serif", 26))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(80)
        .build_cartesian_2d(x_range, y_min..y_max)
        .map_err(render_err)?;

    let axis = &series.axis;
    let x_fmt = |x: &f64| {
        if *x < 0.0 || x.fract().abs() > 1e-9 {
            String::new()
        } else {
            axis.label(*x as usize)
        }
    };
    let log_scale = chart.log_scale;
    let y_fmt = |y: &f64| {
        if log_scale {
            format_value(10f64.powf(*y))
        } else {
            format_value(*y)
        }
    };
    ctx.configure_mesh()
        .x_desc(chart.x_label.as_str())
        .y_desc(chart.y_label.as_str())
        .x_labels(match axis {
            Axis::Dates(_) => 12,
            Axis::Days(_) => 20,
        })
        .x_label_formatter(&x_fmt)
        .y_label_formatter(&y_fmt)
        .draw()
        .map_err(render_err)?;

    let width = 0.8 / series.columns.len().max(1) as f64;
    for (i, (col, pts)) in series.columns.iter().zip(&plotted).enumerate() {
        let color = Palette99::pick(i).to_rgba();
        let anno = match chart.kind {
            ChartKind::Line => {
                ctx.draw_series(LineSeries::new(pts.iter().copied(), color.stroke_width(2)))
            }
            ChartKind::Bar => {
                let offset = -0.4 + width * i as f64;
                ctx.draw_series(pts.iter().map(|&(x, y)| {
                    Rectangle::new([(x + offset, y_min), (x + offset + width, y)], color.filled())
                }))
            }
        }
        .map_err(render_err)?;
        anno.label(col.region.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], color.filled()));
    }

    ctx.configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(render_err)?;

    let (w, h) = root.dim_in_pixel();
    let style = ("sans-serif", 16).into_font().color(&RGBColor(150, 150, 150));
    root.draw(&Text::new(WATERMARK, (w as i32 - 280, h as i32 - 28), style))
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    Ok(())
}

fn y_bounds(plotted: &[Vec<(f64, f64)>], chart: &Chart) -> (f64, f64) {
    let values = plotted.iter().flatten().map(|&(_, y)| y);
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| {
        (lo.min(y), hi.max(y))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    let (lo, hi) = if chart.log_scale {
        (lo.floor(), hi.ceil().max(lo.floor() + 1.0))
    } else {
        (lo.min(0.0), if hi > 0.0 { hi * 1.05 } else { 1.0 })
    };
    (lo, hi.max(lo + f64::EPSILON))
}

fn format_value(v: f64) -> String {
    let a = v.abs();
    if a == 0.0 {
        "0".to_string()
    } else if a < 0.01 {
        format!("{:.1e}", v)
    } else if a < 10.0 {
        format!("{:.2}", v)
    } else {
        format!("{:.0}", v)
    }
}
