use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::warn;

use crate::error::Error;

/// 某地区某一天的新增病例与死亡
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub region: String,
    pub cases: i64,
    pub deaths: i64,
}

/// 按日期升序排列，每个 (日期, 地区) 至多一行
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    observations: Vec<Observation>,
}

impl Dataset {
    pub fn new(rows: impl IntoIterator<Item = Observation>) -> Self {
        // 重复的 (日期, 地区) 以文件中靠后的一行为准
        let mut by_key: BTreeMap<(NaiveDate, String), Observation> = BTreeMap::new();
        for row in rows {
            let key = (row.date, row.region.clone());
            if by_key.insert(key, row).is_some() {
                warn!("duplicate observation replaced by a later row");
            }
        }
        Self {
            observations: by_key.into_values().collect(),
        }
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// 数据中出现过的地区，去重并排序
    pub fn regions(&self) -> Vec<&str> {
        let mut regions: Vec<&str> = self.observations.iter().map(|o| o.region.as_str()).collect();
        regions.sort_unstable();
        regions.dedup();
        regions
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }
}

/// 支持 `2020-03-30` 和 `30/03/2020` 两种写法
pub fn parse_date(s: &str) -> Result<NaiveDate, Error> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%d/%m/%Y"))
        .map_err(|_| Error::InvalidDate(s.to_string()))
}
