//! 命令行参数定义

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use covid19count::config::{
    Config, DATA_FILE, DATA_LINK_PATTERN, DATA_PAGE, OUTPUT_FILE, POPULATION_FILE,
    POPULATION_URL, REGIONS_FILE,
};
use covid19count::dataset::parse_date;
use covid19count::presenter::ChartKind;
use covid19count::transform::{Metric, TransformOptions};

/// Download the ECDC case counts and plot them per country.
///
/// ## Examples
///
///   covid19count plot italy spain --cum --log
///
///   covid19count plot italy china --deaths --cum --from-first-death --outfile deaths.svg
///
///   covid19count listregions --stdout
#[derive(Parser, Debug)]
#[command(name = "covid19count")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory holding data.xls and population.csv
    #[arg(long, global = true, env = "COVID19_CACHE_DIR", default_value = ".")]
    pub cache_dir: PathBuf,

    /// Page that links to today's spreadsheet
    #[arg(long, global = true, env = "COVID19_DATA_PAGE", default_value = DATA_PAGE)]
    pub data_page: String,

    /// Suffix of the spreadsheet link on that page
    #[arg(
        long,
        global = true,
        env = "COVID19_LINK_PATTERN",
        default_value = DATA_LINK_PATTERN
    )]
    pub link_pattern: String,

    #[arg(
        long,
        global = true,
        env = "COVID19_POPULATION_URL",
        default_value = POPULATION_URL
    )]
    pub population_url: String,

    /// Cache file name for the spreadsheet
    #[arg(long, global = true, default_value = DATA_FILE)]
    pub data_file: String,

    /// Cache file name for the population table
    #[arg(long, global = true, default_value = POPULATION_FILE)]
    pub population_file: String,

    /// Seconds before the cached spreadsheet is downloaded again
    #[arg(long, global = true, env = "COVID19_EXPIRY", default_value_t = 3600)]
    pub expiry: u64,

    /// Seconds before the cached population table is downloaded again
    #[arg(
        long,
        global = true,
        env = "COVID19_POPULATION_EXPIRY",
        default_value_t = 30 * 24 * 3600
    )]
    pub population_expiry: u64,

    /// Seconds to wait for any single download
    #[arg(long, global = true, env = "COVID19_TIMEOUT", default_value_t = 30)]
    pub timeout: u64,

    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plot cases or deaths for the given regions
    Plot(PlotArgs),

    /// List the regions present in the dataset
    #[command(name = "listregions")]
    ListRegions {
        /// Print to stdout instead of writing a file
        #[arg(long)]
        stdout: bool,

        #[arg(long, default_value = REGIONS_FILE)]
        outfile: PathBuf,
    },

    /// Plot deaths per confirmed case over time
    Fatality {
        #[arg(required = true)]
        regions: Vec<String>,

        #[arg(long, default_value = OUTPUT_FILE)]
        outfile: PathBuf,

        /// Print the table instead of rendering a chart
        #[arg(long)]
        stdout: bool,
    },
}

#[derive(Args, Debug)]
pub struct PlotArgs {
    /// Region names, case-insensitive
    #[arg(required = true)]
    pub regions: Vec<String>,

    /// Running total instead of daily counts
    #[arg(long)]
    pub cum: bool,

    /// Deaths instead of confirmed cases
    #[arg(long)]
    pub deaths: bool,

    #[arg(long)]
    pub log: bool,

    #[arg(long)]
    pub bar: bool,

    /// Divide by population
    #[arg(long)]
    pub per_capita: bool,

    /// Start every region at its own first nonzero day
    #[arg(long)]
    pub from_first_death: bool,

    /// First date to keep (YYYY-MM-DD or DD/MM/YYYY), inclusive
    #[arg(long, value_parser = parse_date)]
    pub since: Option<NaiveDate>,

    /// Last date to keep, inclusive
    #[arg(long, value_parser = parse_date)]
    pub until: Option<NaiveDate>,

    /// Image path; .svg renders SVG, anything else PNG
    #[arg(long, default_value = OUTPUT_FILE)]
    pub outfile: PathBuf,

    /// Also write the plotted table as CSV
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Print the table instead of rendering a chart
    #[arg(long)]
    pub stdout: bool,
}

impl PlotArgs {
    pub fn options(&self) -> TransformOptions {
        TransformOptions {
            cumulative: self.cum,
            metric: if self.deaths { Metric::Deaths } else { Metric::Cases },
            per_capita: self.per_capita,
            since: self.since,
            until: self.until,
            align_to_first_death: self.from_first_death,
        }
    }

    pub fn chart_kind(&self) -> ChartKind {
        if self.bar {
            ChartKind::Bar
        } else {
            ChartKind::Line
        }
    }
}

impl Cli {
    pub fn config(&self) -> Config {
        Config {
            data_page: self.data_page.clone(),
            data_link_pattern: self.link_pattern.clone(),
            population_url: self.population_url.clone(),
            cache_dir: self.cache_dir.clone(),
            data_file: self.data_file.clone(),
            population_file: self.population_file.clone(),
            data_expiry: Duration::from_secs(self.expiry),
            population_expiry: Duration::from_secs(self.population_expiry),
            request_timeout: Duration::from_secs(self.timeout),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
