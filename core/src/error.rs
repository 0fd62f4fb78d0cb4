use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Payload is neither a JSON object nor a sequence of JSON objects.
    #[error("data type {type_name} is not supported for ingestion")]
    DataTypeNotSupported {
        type_name: &'static str,
        value: serde_json::Value,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("api error from {api}: {details}")]
    Api {
        api: String,
        status: Option<u16>,
        details: String,
    },

    #[error("storage error for s3://{bucket}/{key}: {details}")]
    Storage {
        bucket: String,
        key: String,
        details: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => match e.status() {
                Some(status) => status.is_server_error() || status.as_u16() == 429,
                None => e.is_timeout() || e.is_connect() || e.is_request(),
            },
            Error::Api { status, .. } => status.map_or(true, |s| s == 429 || s >= 500),
            _ => false,
        }
    }
}
