use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolkitError {
    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Record store error: {message}")]
    StoreError { message: String },

    #[error("Invalid CSV header format: {detail}")]
    InvalidHeaderError { detail: String },

    #[error("Malformed CSV row on line {line}: expected 3 columns, found {columns}")]
    MalformedRowError { line: u64, columns: usize },

    #[error("Group {id} does not exist or is not a group record")]
    GroupNotFoundError { id: u64 },
}

pub type Result<T> = std::result::Result<T, ToolkitError>;
