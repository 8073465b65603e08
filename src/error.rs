use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("cannot read data file {path} (file exists: {exists}): {source}")]
    Unreadable {
        path: PathBuf,
        exists: bool,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read workbook: {0}")]
    Workbook(String),

    #[error("workbook contains no worksheet")]
    EmptyWorkbook,

    #[error("missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("'{value}' is not a valid {field} selection")]
    InvalidSelection { field: &'static str, value: String },

    #[error("no data loaded, load a file first")]
    NoData,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XLSX write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
