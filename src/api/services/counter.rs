use actix_web::{HttpRequest, Responder, web};
use tracing::trace;

use super::types::{
    CountResponse, ERR_READ_COUNT, ERR_UPDATE_COUNT, MSG_COUNT_UPDATED, UpdateCountResponse,
    json_error, json_ok,
};
use crate::services::CounterService;

/// Counter endpoints
pub struct CounterApi;

impl CounterApi {
    /// `POST /api/update-count`
    pub async fn update_count(
        req: HttpRequest,
        service: web::Data<CounterService>,
    ) -> impl Responder {
        trace!("Received update-count request");

        match service.increment().await {
            Ok(count) => json_ok(&UpdateCountResponse {
                message: MSG_COUNT_UPDATED.to_string(),
                count,
            }),
            Err(e) => json_error(&req, ERR_UPDATE_COUNT, &e),
        }
    }

    /// `GET /api/visitor-count`
    pub async fn visitor_count(
        req: HttpRequest,
        service: web::Data<CounterService>,
    ) -> impl Responder {
        trace!("Received visitor-count request");

        match service.get_count().await {
            Ok(count) => json_ok(&CountResponse { count }),
            Err(e) => json_error(&req, ERR_READ_COUNT, &e),
        }
    }
}
