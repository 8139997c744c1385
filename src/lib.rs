use std::ops::{Deref, DerefMut};

use anyhow::Result;
use chrono::NaiveDate;
use polars::prelude::{CsvWriter, DataFrame, NamedFrom, SerWriter, Series};
use tracing::info;

use crate::cache::{CachedFetcher, FileCache};
use crate::fetcher::Downloader;
use crate::load::detect_content;
use crate::population::load_population;
use crate::transform::{Axis, PlotSeries, TransformOptions};

pub mod cache;
pub mod config;
pub mod convert;
pub mod dataset;
pub mod error;
pub mod fetcher;
pub mod load;
pub mod locator;
pub mod population;
pub mod presenter;
pub mod region;
pub mod schema;
pub mod transform;

pub use config::Config;
pub use dataset::{Dataset, Observation};
pub use error::Error;
pub use population::PopulationTable;

/// 变换结果对应的 polars 表，第一列是横轴
#[derive(Debug)]
pub struct SeriesTable(DataFrame);

impl Deref for SeriesTable {
    type Target = DataFrame;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for SeriesTable {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl TryFrom<&PlotSeries> for SeriesTable {
    type Error = anyhow::Error;

    fn try_from(series: &PlotSeries) -> Result<Self> {
        let mut columns = Vec::with_capacity(series.columns.len() + 1);
        columns.push(match &series.axis {
            Axis::Dates(dates) => Series::new(
                "date",
                dates.iter().map(|d| d.to_string()).collect::<Vec<_>>(),
            ),
            Axis::Days(n) => Series::new("day", (0..*n as i64).collect::<Vec<_>>()),
        });
        for col in &series.columns {
            columns.push(Series::new(col.region.as_str(), col.values.clone()));
        }
        Ok(SeriesTable(DataFrame::new(columns)?))
    }
}

// SeriesTable 内部方法
impl SeriesTable {
    /// SeriesTable 转换为 CSV
    pub fn to_csv(&self) -> Result<String> {
        let mut buf = Vec::new();
        let mut df = self.0.clone();
        CsvWriter::new(&mut buf).finish(&mut df)?;
        Ok(String::from_utf8(buf)?)
    }
}

/// 变换后的数据，以及绘图需要的上下文
#[derive(Debug, Clone)]
pub struct Prepared {
    pub series: PlotSeries,
    /// 数据中最新的日期
    pub as_of: Option<NaiveDate>,
    /// 被丢掉的地区
    pub unknown: Vec<String>,
}

/// 下载（或读缓存）、解析、过滤、变换
pub struct App {
    config: Config,
    data: CachedFetcher<FileCache>,
    population: CachedFetcher<FileCache>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let downloader = Downloader::new(config.request_timeout)?;
        let data = CachedFetcher::new(
            FileCache::new(&config.cache_dir, config.data_expiry),
            downloader.clone(),
        );
        let population = CachedFetcher::new(
            FileCache::new(&config.cache_dir, config.population_expiry),
            downloader,
        );
        Ok(Self {
            config,
            data,
            population,
        })
    }

    pub async fn dataset(&self) -> Result<Dataset> {
        let source = self.config.data_source();
        let data = self
            .data
            .acquire(&self.config.data_file, || source.resolve(self.data.downloader()))
            .await?;
        detect_content(data).load()
    }

    pub async fn population(&self) -> Result<PopulationTable> {
        let source = self.config.population_source();
        load_population(&self.population, &self.config.population_file, &source).await
    }

    pub async fn plot(&self, requested: &[String], options: &TransformOptions) -> Result<Prepared> {
        let dataset = self.dataset().await?;
        let selection = region::filter(requested, &dataset);
        info!(regions = ?selection.regions, "plotting");

        let population = if options.per_capita {
            Some(self.population().await?)
        } else {
            None
        };
        let series =
            transform::transform(&dataset, &selection.regions, options, population.as_ref())?;
        Ok(Prepared {
            series,
            as_of: dataset.latest_date(),
            unknown: selection.unknown,
        })
    }

    pub async fn fatality(&self, requested: &[String]) -> Result<Prepared> {
        let dataset = self.dataset().await?;
        let selection = region::filter(requested, &dataset);
        info!(regions = ?selection.regions, "computing fatality rate");

        let series = transform::fatality_rate(&dataset, &selection.regions)?;
        Ok(Prepared {
            series,
            as_of: dataset.latest_date(),
            unknown: selection.unknown,
        })
    }
}
