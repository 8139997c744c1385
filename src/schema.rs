use crate::error::Error;

/// 病例表格的列名。发布方改过一次列名，所以按版本列出来，
/// 新的改名只需要在 [`SCHEMAS`] 里加一行
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub version: &'static str,
    pub date: &'static str,
    pub region: &'static str,
    pub cases: &'static str,
    pub deaths: &'static str,
}

pub const SCHEMAS: &[Schema] = &[
    Schema {
        version: "v2",
        date: "dateRep",
        region: "countriesAndTerritories",
        cases: "cases",
        deaths: "deaths",
    },
    Schema {
        version: "v1",
        date: "DateRep",
        region: "Countries and territories",
        cases: "Cases",
        deaths: "Deaths",
    },
];

/// 各列在表头中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnIndex {
    pub date: usize,
    pub region: usize,
    pub cases: usize,
    pub deaths: usize,
}

impl Schema {
    fn locate(&self, headers: &[String]) -> Option<ColumnIndex> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        Some(ColumnIndex {
            date: find(self.date)?,
            region: find(self.region)?,
            cases: find(self.cases)?,
            deaths: find(self.deaths)?,
        })
    }
}

/// 按表头选出第一个所有列都存在的版本
pub fn detect(headers: &[String]) -> Result<(&'static Schema, ColumnIndex), Error> {
    SCHEMAS
        .iter()
        .find_map(|s| s.locate(headers).map(|idx| (s, idx)))
        .ok_or_else(|| Error::SchemaMismatch(headers.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn detects_camel_case_schema() {
        let h = headers(&[
            "dateRep", "day", "month", "year", "cases", "deaths", "countriesAndTerritories",
        ]);
        let (schema, idx) = detect(&h).unwrap();
        assert_eq!(schema.version, "v2");
        assert_eq!(idx, ColumnIndex { date: 0, region: 6, cases: 4, deaths: 5 });
    }

    #[test]
    fn detects_capitalised_schema() {
        let h = headers(&["DateRep", "Countries and territories", "Cases", "Deaths", "GeoId"]);
        let (schema, idx) = detect(&h).unwrap();
        assert_eq!(schema.version, "v1");
        assert_eq!(idx.region, 1);
    }

    #[test]
    fn renamed_column_is_a_mismatch() {
        let h = headers(&["dateRep", "country", "cases", "deaths"]);
        assert_eq!(detect(&h).unwrap_err(), Error::SchemaMismatch(h));
    }
}
