use std::collections::HashMap;

use anyhow::Result;
use serde::Deserialize;
use tracing::info;

use crate::cache::{Cache, CachedFetcher};
use crate::error::Error;
use crate::locator::Source;

// 病例数据和人口数据对同一个国家的叫法不一样，只收录了常见的几个
const ALIASES: &[(&str, &str)] = &[
    ("united states of america", "united states"),
    ("united kingdom of great britain and northern ireland", "united kingdom"),
    ("russia", "russian federation"),
    ("iran", "iran, islamic rep."),
    ("south korea", "korea, rep."),
    ("egypt", "egypt, arab rep."),
    ("venezuela", "venezuela, rb"),
    ("syria", "syrian arab republic"),
    ("slovakia", "slovak republic"),
    ("kyrgyzstan", "kyrgyz republic"),
    ("laos", "lao pdr"),
    ("gambia", "gambia, the"),
    ("bahamas", "bahamas, the"),
    ("democratic republic of the congo", "congo, dem. rep."),
    ("congo", "congo, rep."),
    ("united republic of tanzania", "tanzania"),
    ("cote divoire", "cote d'ivoire"),
];

#[derive(Debug, Deserialize)]
struct PopulationRow {
    #[serde(alias = "Country Name", alias = "Entity")]
    country: String,
    #[serde(alias = "Year")]
    year: i32,
    #[serde(alias = "Value", alias = "Population")]
    value: f64,
}

/// 国家名（小写） -> 最近一年的人口
#[derive(Debug, Clone, Default)]
pub struct PopulationTable {
    latest: HashMap<String, (i32, f64)>,
}

impl PopulationTable {
    pub fn from_csv(data: &[u8]) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(data);
        let mut table = Self::default();
        for row in reader.deserialize() {
            let row: PopulationRow = row?;
            table.insert(&row.country, row.year, row.value);
        }
        info!(countries = table.len(), "loaded population table");
        Ok(table)
    }

    /// 同一个国家保留年份最新的一行，年份相同时后出现的覆盖前面的
    pub fn insert(&mut self, country: &str, year: i32, value: f64) {
        let key = normalize(country);
        match self.latest.get(&key) {
            Some((y, _)) if *y > year => {}
            _ => {
                self.latest.insert(key, (year, value));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }

    /// 找不到时返回 MissingPopulation，不会默认成 0
    pub fn lookup(&self, region: &str) -> Result<f64, Error> {
        let key = normalize(region);
        let found = self.latest.get(&key).or_else(|| {
            ALIASES
                .iter()
                .find(|(from, _)| *from == key)
                .and_then(|(_, to)| self.latest.get(*to))
        });
        found
            .map(|(_, value)| *value)
            .ok_or_else(|| Error::MissingPopulation(region.to_string()))
    }
}

// 小写，下划线当空格
fn normalize(name: &str) -> String {
    name.trim().replace('_', " ").to_lowercase()
}

pub async fn load_population<C: Cache>(
    fetcher: &CachedFetcher<C>,
    key: &str,
    source: &Source,
) -> Result<PopulationTable> {
    let data = fetcher
        .acquire(key, || source.resolve(fetcher.downloader()))
        .await?;
    PopulationTable::from_csv(&data)
}
