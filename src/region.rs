use std::collections::HashMap;
use std::io::{self, Write};

use tracing::warn;

use crate::dataset::Dataset;

/// 用户请求的地区过滤后的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// 数据中的原始写法，按请求顺序，去重
    pub regions: Vec<String>,
    /// 数据里不存在的请求
    pub unknown: Vec<String>,
}

/// 不区分大小写地检查地区是否存在，不存在的丢掉并记录
pub fn filter<S: AsRef<str>>(requested: &[S], dataset: &Dataset) -> Selection {
    let known: HashMap<String, &str> = dataset
        .regions()
        .into_iter()
        .map(|r| (r.to_lowercase(), r))
        .collect();

    let mut selection = Selection::default();
    for name in requested {
        let name = name.as_ref().trim();
        match known.get(&name.to_lowercase()) {
            Some(canonical) => {
                if !selection.regions.iter().any(|r| r == canonical) {
                    selection.regions.push(canonical.to_string());
                }
            }
            None => {
                warn!("region '{}' does not exist in the dataset", name);
                selection.unknown.push(name.to_string());
            }
        }
    }
    selection
}

/// 给用户看的提示，和日志级别无关
pub fn report_unknown<W: Write>(unknown: &[String], mut out: W) -> io::Result<()> {
    for name in unknown {
        writeln!(out, "Error: Region '{}' does not exist in the dataset", name)?;
    }
    out.flush()
}

/// 每行一个地区名
pub fn write_regions<W: Write>(dataset: &Dataset, mut out: W) -> io::Result<()> {
    for region in dataset.regions() {
        writeln!(out, "{}", region)?;
    }
    out.flush()
}
