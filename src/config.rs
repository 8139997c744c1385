use std::path::PathBuf;
use std::time::Duration;

use crate::locator::Source;

pub const DATA_PAGE: &str = "https://www.ecdc.europa.eu/en/publications-data/\
    download-todays-data-geographic-distribution-covid-19-cases-worldwide";
pub const DATA_LINK_PATTERN: &str = ".xls";
pub const POPULATION_URL: &str =
    "https://raw.githubusercontent.com/datasets/population/master/data/population.csv";

pub const DATA_FILE: &str = "data.xls";
pub const POPULATION_FILE: &str = "population.csv";
pub const REGIONS_FILE: &str = "regions.txt";
pub const OUTPUT_FILE: &str = "output.png";

pub const DATA_EXPIRY: Duration = Duration::from_secs(60 * 60);
pub const POPULATION_EXPIRY: Duration = Duration::from_secs(30 * 24 * 60 * 60);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const WATERMARK: &str = "covid19count - data: ECDC";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// 挂着病例表格链接的页面
    pub data_page: String,
    pub data_link_pattern: String,
    pub population_url: String,
    pub cache_dir: PathBuf,
    pub data_file: String,
    pub population_file: String,
    pub data_expiry: Duration,
    pub population_expiry: Duration,
    /// 单个 http 请求（连接加读完响应）的上限
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_page: DATA_PAGE.to_string(),
            data_link_pattern: DATA_LINK_PATTERN.to_string(),
            population_url: POPULATION_URL.to_string(),
            cache_dir: PathBuf::from("."),
            data_file: DATA_FILE.to_string(),
            population_file: POPULATION_FILE.to_string(),
            data_expiry: DATA_EXPIRY,
            population_expiry: POPULATION_EXPIRY,
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}

impl Config {
    pub fn data_source(&self) -> Source {
        Source::Scraped {
            page: self.data_page.clone(),
            pattern: self.data_link_pattern.clone(),
        }
    }

    pub fn population_source(&self) -> Source {
        Source::Direct(self.population_url.clone())
    }
}
