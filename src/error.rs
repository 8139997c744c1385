use thiserror::Error;

/// 需要调用方区分的错误，统一包在 anyhow::Error 里向上传递
#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("no link matching '{pattern}' found on {page}")]
    LinkNotFound { page: String, pattern: String },

    #[error("unsupported source '{0}', we only support http/https/file at the moment")]
    UnsupportedSource(String),

    #[error("download of {url} failed with HTTP status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("spreadsheet columns do not match any known schema, found: {0:?}")]
    SchemaMismatch(Vec<String>),

    #[error("row {row}: cannot read {column} from {value:?}")]
    BadCell {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("invalid date '{0}', expected YYYY-MM-DD or DD/MM/YYYY")]
    InvalidDate(String),

    #[error("no valid regions left to plot")]
    NoRegions,

    #[error("no population figure for region '{0}'")]
    MissingPopulation(String),
}
