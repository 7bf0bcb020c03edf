use axum::{
    response::{IntoResponse, Response},
    http::{header, HeaderValue, StatusCode},
};

use crate::api::response;

/// Failures reported by the extraction pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("Failed to fetch the URL: {0}")]
    FetchFailed(String),

    #[error("{url} responded with status {status}")]
    UpstreamHttp { status: u16, url: String },

    #[error("Failed to extract content: {0}")]
    ExtractionFailed(String),

    #[error("Unsupported format '{0}', expected one of: markdown, txt, html, json, xml, csv")]
    InvalidFormat(String),

    #[error("{0}")]
    Internal(String),
}

/// Request-level errors, each bound to one HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid or missing token")]
    Unauthorized,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    FetchOrExtraction(String),

    #[error("HTTP error: {0}")]
    UpstreamHttp(String),

    #[error("Unexpected error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::FetchOrExtraction(_) => StatusCode::BAD_REQUEST,
            AppError::UpstreamHttp(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut res = response::error(status, self.to_string()).into_response();

        if status == StatusCode::UNAUTHORIZED {
            res.headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        res
    }
}

impl From<ScrapeError> for AppError {
    fn from(err: ScrapeError) -> Self {
        match err {
            ScrapeError::FetchFailed(_) | ScrapeError::ExtractionFailed(_) => {
                AppError::FetchOrExtraction(err.to_string())
            }
            ScrapeError::UpstreamHttp { .. } => AppError::UpstreamHttp(err.to_string()),
            ScrapeError::InvalidFormat(_) => AppError::InvalidRequest(err.to_string()),
            ScrapeError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ScrapeError::FetchFailed("request timed out".to_string())
        } else {
            ScrapeError::FetchFailed(err.to_string())
        }
    }
}

impl From<tokio::task::JoinError> for ScrapeError {
    fn from(err: tokio::task::JoinError) -> Self {
        ScrapeError::Internal(format!("extraction task failed: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
