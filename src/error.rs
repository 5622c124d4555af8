use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::backend::hass::auth::AuthError;
use crate::routes::extractor::Json;

#[derive(Error, Debug)]
pub enum ApiError {
    /* mapped errors */
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    SerdeYaml(#[from] serde_yml::Error),

    #[error(transparent)]
    ConfigError(#[from] config::ConfigError),

    #[error(transparent)]
    SetLoggerError(#[from] log::SetLoggerError),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    TungsteniteError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    AuthError(#[from] AuthError),

    #[error(transparent)]
    JsonRejection(#[from] JsonRejection),

    #[error(transparent)]
    ZashboardError(#[from] zashboard_api::error::ZashboardError),

    /* zashboard errors */
    #[error("Invalid dashboard payload")]
    InvalidPayload,

    #[error("Failed to save dashboard.yaml")]
    SaveFailed,

    #[error("Home Assistant connection closed")]
    ConnectionClosed,

    #[error("Service error: {0}")]
    ServiceError(String),
}

impl ApiError {
    #[must_use]
    pub const fn service_error(msg: String) -> Self {
        Self::ServiceError(msg)
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPayload | Self::JsonRejection(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // body rejections are reported with the same message as any other
        // unusable payload
        let msg = match self {
            Self::JsonRejection(err) => {
                log::debug!("Rejected request body: {err}");
                Self::InvalidPayload.to_string()
            }
            err => {
                if status.is_server_error() {
                    log::error!("Request failed: {err}");
                }
                err.to_string()
            }
        };

        (status, Json(json!({"error": msg}))).into_response()
    }
}
