use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZashboardError {
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    /// Non-success reply from the dashboard server. The message is the
    /// server-provided `error` field when present, otherwise `HTTP <status>`.
    #[error("{0}")]
    ServerError(String),

    #[error("Invalid dashboard payload")]
    InvalidDashboard,
}

pub type ZashboardResult<T> = Result<T, ZashboardError>;
