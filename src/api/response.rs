use axum::Json;
use axum::http::StatusCode;

use crate::api::models::{ExtractedContent, ScrapeResponse};

pub fn success(data: ExtractedContent) -> (StatusCode, Json<ScrapeResponse>) {
    (
        StatusCode::OK,
        Json(ScrapeResponse {
            success: true,
            data: Some(data),
            error: None,
        }),
    )
}

pub fn error(status: StatusCode, message: String) -> (StatusCode, Json<ScrapeResponse>) {
    (
        status,
        Json(ScrapeResponse {
            success: false,
            data: None,
            error: Some(message),
        }),
    )
}
