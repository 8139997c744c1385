use std::io::Cursor;
use std::path::Path;

use anyhow::{anyhow, Result};
use calamine::Reader;
use chrono::NaiveDate;
use tracing::info;

use crate::convert::{Cell, Count, Name};
use crate::dataset::{Dataset, Observation};
use crate::error::Error;
use crate::schema::{self, ColumnIndex};

// OLE2 (xls) 和 zip (xlsx) 的文件头
const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// 下载回来的内容，按文件头判断格式
#[derive(Debug)]
pub enum Content {
    Workbook(Vec<u8>),
    Csv(Vec<u8>),
}

pub fn detect_content(data: Vec<u8>) -> Content {
    if data.starts_with(OLE2_MAGIC) || data.starts_with(ZIP_MAGIC) {
        Content::Workbook(data)
    } else {
        Content::Csv(data)
    }
}

impl Content {
    pub fn load(self) -> Result<Dataset> {
        let dataset = match self {
            Content::Workbook(data) => load_workbook(data)?,
            Content::Csv(data) => load_csv(&data)?,
        };
        info!(
            rows = dataset.len(),
            regions = dataset.regions().len(),
            "loaded case data"
        );
        Ok(dataset)
    }
}

pub fn load_path(path: impl AsRef<Path>) -> Result<Dataset> {
    detect_content(std::fs::read(path)?).load()
}

fn load_workbook(data: Vec<u8>) -> Result<Dataset> {
    let mut wb = calamine::open_workbook_auto_from_rs(Cursor::new(data))?;
    let sheet = wb
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("workbook has no sheets"))?;
    let range = wb.worksheet_range(&sheet)?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|r| r.iter().map(|c| header_name(&Cell::from(c).describe())).collect())
        .unwrap_or_default();
    let (schema, idx) = schema::detect(&headers)?;
    info!(schema = schema.version, sheet = %sheet, "reading workbook");

    let mut observations = Vec::new();
    for (i, row) in rows.enumerate() {
        let cells: Vec<Cell> = row.iter().map(Cell::from).collect();
        if cells.iter().all(|c| *c == Cell::Empty) {
            continue;
        }
        observations.push(to_observation(i + 2, &cells, idx)?);
    }
    Ok(Dataset::new(observations))
}

fn load_csv(data: &[u8]) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(data);
    let headers: Vec<String> = reader.headers()?.iter().map(header_name).collect();
    let (schema, idx) = schema::detect(&headers)?;
    info!(schema = schema.version, "reading csv");

    let mut observations = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let cells: Vec<Cell> = record.iter().map(Cell::from).collect();
        if cells.iter().all(|c| *c == Cell::Empty) {
            continue;
        }
        observations.push(to_observation(i + 2, &cells, idx)?);
    }
    Ok(Dataset::new(observations))
}

fn header_name(h: &str) -> String {
    h.trim_start_matches('\u{feff}').trim().to_string()
}

fn to_observation(row: usize, cells: &[Cell], idx: ColumnIndex) -> Result<Observation, Error> {
    let cell = |i: usize| cells.get(i).copied().unwrap_or(Cell::Empty);
    let bad = |column: &'static str| move |value: String| Error::BadCell { row, column, value };

    Ok(Observation {
        date: NaiveDate::try_from(cell(idx.date)).map_err(bad("date"))?,
        region: Name::try_from(cell(idx.region)).map_err(bad("region"))?.0,
        cases: Count::try_from(cell(idx.cases)).map_err(bad("cases"))?.0,
        deaths: Count::try_from(cell(idx.deaths)).map_err(bad("deaths"))?.0,
    })
}
