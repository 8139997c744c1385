use chrono::{Days, NaiveDate};

use crate::dataset::parse_date;

/// 表格单元格的统一表示，xls 和 csv 两种来源都先转成它
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    Empty,
    Text(&'a str),
    Number(f64),
    /// Excel 日期序列号（1900 日期系统）
    Serial(f64),
}

impl<'a> From<&'a calamine::Data> for Cell<'a> {
    fn from(d: &'a calamine::Data) -> Self {
        match d {
            calamine::Data::Empty => Cell::Empty,
            calamine::Data::String(s) | calamine::Data::DateTimeIso(s) => Cell::Text(s),
            calamine::Data::Float(f) => Cell::Number(*f),
            calamine::Data::Int(i) => Cell::Number(*i as f64),
            calamine::Data::DateTime(dt) => Cell::Serial(dt.as_f64()),
            _ => Cell::Empty,
        }
    }
}

impl<'a> From<&'a str> for Cell<'a> {
    fn from(s: &'a str) -> Self {
        if s.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s)
        }
    }
}

impl Cell<'_> {
    pub fn describe(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.to_string(),
            Cell::Number(f) | Cell::Serial(f) => f.to_string(),
        }
    }
}

// 因为 Rust trait 的孤儿规则，NaiveDate / i64 都不是我们的类型，
// 但 Cell 是，所以可以直接为它们实现 TryFrom<Cell>
// 失败时返回单元格内容，由调用方补上行号和列名

impl TryFrom<Cell<'_>> for NaiveDate {
    type Error = String;

    fn try_from(cell: Cell<'_>) -> Result<Self, Self::Error> {
        match cell {
            Cell::Text(s) => parse_date(s).map_err(|_| cell.describe()),
            Cell::Serial(f) | Cell::Number(f) if f >= 1.0 => excel_epoch()
                .and_then(|epoch| epoch.checked_add_days(Days::new(f.floor() as u64)))
                .ok_or_else(|| cell.describe()),
            _ => Err(cell.describe()),
        }
    }
}

/// 计数列。空单元格按 0 处理
pub struct Count(pub i64);

impl TryFrom<Cell<'_>> for Count {
    type Error = String;

    fn try_from(cell: Cell<'_>) -> Result<Self, Self::Error> {
        match cell {
            Cell::Empty => Ok(Count(0)),
            Cell::Number(f) if f.is_finite() => Ok(Count(f.round() as i64)),
            Cell::Text(s) => {
                let s = s.trim();
                let float = || s.parse::<f64>().ok().filter(|f| f.is_finite());
                s.parse::<i64>()
                    .ok()
                    .or_else(|| float().map(|f| f.round() as i64))
                    .map(Count)
                    .ok_or_else(|| cell.describe())
            }
            _ => Err(cell.describe()),
        }
    }
}

/// 地区名称列
pub struct Name(pub String);

impl TryFrom<Cell<'_>> for Name {
    type Error = String;

    fn try_from(cell: Cell<'_>) -> Result<Self, Self::Error> {
        match cell {
            Cell::Text(s) if !s.trim().is_empty() => Ok(Name(s.trim().to_string())),
            _ => Err(cell.describe()),
        }
    }
}

// 1900 日期系统的第 0 天；序列号 60 是不存在的 1900-02-29，之后的日期都从这里数
fn excel_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn excel_serial_converts_to_date() {
        // 43920 = 2020-03-30
        let d: NaiveDate = Cell::Serial(43920.0).try_into().unwrap();
        assert_eq!(d, date("2020-03-30"));
    }

    #[test]
    fn text_dates_use_either_format() {
        let a: NaiveDate = Cell::Text("30/03/2020").try_into().unwrap();
        let b: NaiveDate = Cell::Text("2020-03-30").try_into().unwrap();
        assert_eq!(a, b);
        assert!(NaiveDate::try_from(Cell::Text("yesterday")).is_err());
    }

    #[test]
    fn counts_accept_numbers_text_and_blanks() {
        assert_eq!(Count::try_from(Cell::Number(12.0)).unwrap().0, 12);
        assert_eq!(Count::try_from(Cell::Text(" 7 ")).unwrap().0, 7);
        assert_eq!(Count::try_from(Cell::Text("-3")).unwrap().0, -3);
        assert_eq!(Count::try_from(Cell::from("")).unwrap().0, 0);
        assert_eq!(Count::try_from(Cell::Text("n/a")).err(), Some("n/a".to_string()));
    }

    #[test]
    fn names_are_trimmed_and_required() {
        assert_eq!(Name::try_from(Cell::Text(" Italy ")).unwrap().0, "Italy");
        assert!(Name::try_from(Cell::Empty).is_err());
        assert!(Name::try_from(Cell::Number(1.0)).is_err());
    }
}
