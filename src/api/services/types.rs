//! JSON bodies returned by the counter API

use actix_web::http::header::{CACHE_CONTROL, HeaderValue};
use actix_web::{HttpMessage, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::api::middleware::RequestId;
use crate::errors::CounterError;

pub const MSG_COUNT_UPDATED: &str = "Count updated successfully";
pub const MSG_VISITOR_LOGGED: &str = "Visitor logged successfully";

pub const ERR_UPDATE_COUNT: &str = "Failed to update count";
pub const ERR_READ_COUNT: &str = "Failed to read count";
pub const ERR_LOG_VISITOR: &str = "Failed to log visitor info";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateCountResponse {
    pub message: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
    /// `E001`..`E006`
    pub code: String,
    /// Same value as the `X-Request-ID` response header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: &str, cause: &CounterError) -> Self {
        Self {
            error: error.to_string(),
            details: cause.message().to_string(),
            code: cause.code().to_string(),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }
}

fn no_store(mut response: HttpResponse) -> HttpResponse {
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// 200 JSON with `Cache-Control: no-store`
pub fn json_ok<T: Serialize>(body: &T) -> HttpResponse {
    no_store(HttpResponse::Ok().json(body))
}

/// Every storage or lookup failure is reported as 500
pub fn json_error(req: &HttpRequest, error: &str, cause: &CounterError) -> HttpResponse {
    let request_id = req.extensions().get::<RequestId>().map(|id| id.0.clone());

    let body = ErrorResponse::new(error, cause).with_request_id(request_id);
    no_store(HttpResponse::InternalServerError().json(body))
}
