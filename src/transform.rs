//! 把长表（每行一个 日期/地区）转成每个地区一列的宽表，再做各种变换。
//!
//! 变换顺序固定：透视 -> 去掉开头全为 0 的行 -> 累计 -> 按日期截取
//! -> 按人口归一 -> 按各自首个非零值对齐。

use std::collections::{BTreeSet, HashMap};

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use tracing::debug;

use crate::dataset::Dataset;
use crate::error::Error;
use crate::population::PopulationTable;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Metric {
    #[default]
    Cases,
    Deaths,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOptions {
    pub cumulative: bool,
    pub metric: Metric,
    pub per_capita: bool,
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    pub align_to_first_death: bool,
}

/// 横轴：日历日期，或者对齐后的天数
#[derive(Debug, Clone, PartialEq)]
pub enum Axis {
    Dates(Vec<NaiveDate>),
    Days(usize),
}

impl Axis {
    pub fn len(&self) -> usize {
        match self {
            Axis::Dates(dates) => dates.len(),
            Axis::Days(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn label(&self, i: usize) -> String {
        match self {
            Axis::Dates(dates) => dates.get(i).map(|d| d.to_string()).unwrap_or_default(),
            Axis::Days(_) => i.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub region: String,
    /// None 表示没有数据（对齐后补齐的部分、无法计算的比例）
    pub values: Vec<Option<f64>>,
}

/// 每个地区一列，行与 `axis` 一一对应
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSeries {
    pub axis: Axis,
    pub columns: Vec<Column>,
}

impl PlotSeries {
    pub fn len(&self) -> usize {
        self.axis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axis.is_empty()
    }

    pub fn column(&self, region: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.region == region)
    }

    /// 某列里有值的部分
    pub fn values(&self, region: &str) -> Vec<f64> {
        self.column(region)
            .map(|c| c.values.iter().flatten().copied().collect())
            .unwrap_or_default()
    }

    fn retain_rows(&mut self, range: std::ops::Range<usize>) {
        if let Axis::Dates(dates) = &mut self.axis {
            dates.truncate(range.end);
            dates.drain(..range.start);
        }
        for col in &mut self.columns {
            col.values.truncate(range.end);
            col.values.drain(..range.start);
        }
    }
}

pub fn transform(
    dataset: &Dataset,
    regions: &[String],
    options: &TransformOptions,
    population: Option<&PopulationTable>,
) -> Result<PlotSeries> {
    let mut series = pivot(dataset, regions, options.metric)?;
    truncate_leading_zeros(&mut series);
    if options.cumulative {
        cumulative(&mut series);
    }
    slice_dates(&mut series, options.since, options.until);
    if options.per_capita {
        let table = population.ok_or_else(|| anyhow!("per-capita mode needs a population table"))?;
        per_capita(&mut series, table)?;
    }
    if options.align_to_first_death {
        series = align_to_first_nonzero(&series);
    }
    debug!(rows = series.len(), columns = series.columns.len(), "transformed");
    Ok(series)
}

/// 选出的地区各占一列；某地区某天没有记录时按 0 计
pub fn pivot(dataset: &Dataset, regions: &[String], metric: Metric) -> Result<PlotSeries> {
    if regions.is_empty() {
        return Err(Error::NoRegions.into());
    }
    let column_of: HashMap<&str, usize> = regions
        .iter()
        .enumerate()
        .map(|(i, r)| (r.as_str(), i))
        .collect();

    let selected = || {
        dataset
            .observations()
            .iter()
            .filter_map(|o| column_of.get(o.region.as_str()).map(|&c| (c, o)))
    };

    let dates: Vec<NaiveDate> = selected()
        .map(|(_, o)| o.date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let row_of: HashMap<NaiveDate, usize> =
        dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

    let mut columns: Vec<Column> = regions
        .iter()
        .map(|r| Column {
            region: r.clone(),
            values: vec![Some(0.0); dates.len()],
        })
        .collect();
    for (c, o) in selected() {
        let value = match metric {
            Metric::Cases => o.cases,
            Metric::Deaths => o.deaths,
        };
        columns[c].values[row_of[&o.date]] = Some(value as f64);
    }

    Ok(PlotSeries {
        axis: Axis::Dates(dates),
        columns,
    })
}

/// 去掉所有地区之和首次 >= 1 之前的行；从未达到时整张表为空
pub fn truncate_leading_zeros(series: &mut PlotSeries) {
    let first = (0..series.len()).find(|&row| {
        let total: f64 = series.columns.iter().filter_map(|c| c.values[row]).sum();
        total >= 1.0
    });
    let len = series.len();
    series.retain_rows(first.unwrap_or(len)..len);
}

pub fn cumulative(series: &mut PlotSeries) {
    for col in &mut series.columns {
        let mut total = 0.0;
        for v in col.values.iter_mut().flatten() {
            total += *v;
            *v = total;
        }
    }
}

/// 含两端
pub fn slice_dates(series: &mut PlotSeries, since: Option<NaiveDate>, until: Option<NaiveDate>) {
    let Axis::Dates(dates) = &series.axis else {
        return;
    };
    let start = since.map_or(0, |s| dates.partition_point(|d| *d < s));
    let end = until.map_or(dates.len(), |u| dates.partition_point(|d| *d <= u));
    let range = start..end.max(start);
    series.retain_rows(range);
}

/// 先查齐所有地区的人口，任何一个缺失都直接报错
pub fn per_capita(series: &mut PlotSeries, table: &PopulationTable) -> Result<(), Error> {
    let populations = series
        .columns
        .iter()
        .map(|c| table.lookup(&c.region))
        .collect::<Result<Vec<_>, _>>()?;
    for (col, population) in series.columns.iter_mut().zip(populations) {
        for v in col.values.iter_mut().flatten() {
            *v /= population;
        }
    }
    Ok(())
}

/// 每列从自己的第一个非零值开始，重新按 0, 1, 2... 编号，短的列用 None 补齐
pub fn align_to_first_nonzero(series: &PlotSeries) -> PlotSeries {
    let trimmed: Vec<Column> = series
        .columns
        .iter()
        .map(|c| {
            let start = c
                .values
                .iter()
                .position(|v| matches!(v, Some(x) if *x != 0.0))
                .unwrap_or(c.values.len());
            Column {
                region: c.region.clone(),
                values: c.values[start..].to_vec(),
            }
        })
        .collect();

    let days = trimmed.iter().map(|c| c.values.len()).max().unwrap_or(0);
    let columns = trimmed
        .into_iter()
        .map(|mut c| {
            c.values.resize(days, None);
            c
        })
        .collect();

    PlotSeries {
        axis: Axis::Days(days),
        columns,
    }
}

/// 累计死亡 / 累计病例 * 100，从第一个有病例的日子开始
pub fn fatality_rate(dataset: &Dataset, regions: &[String]) -> Result<PlotSeries> {
    let mut cases = pivot(dataset, regions, Metric::Cases)?;
    let mut deaths = pivot(dataset, regions, Metric::Deaths)?;
    truncate_leading_zeros(&mut cases);
    let start = deaths.len() - cases.len();
    let len = deaths.len();
    deaths.retain_rows(start..len);
    cumulative(&mut cases);
    cumulative(&mut deaths);

    for (c, d) in cases.columns.iter_mut().zip(&deaths.columns) {
        for (v, dead) in c.values.iter_mut().zip(&d.values) {
            *v = match (*v, *dead) {
                (Some(total), Some(dead)) if total > 0.0 => Some(dead / total * 100.0),
                _ => None,
            };
        }
    }
    Ok(cases)
}
