use actix_web::{HttpRequest, Responder, web};
use tracing::trace;

use super::types::{ERR_LOG_VISITOR, MSG_VISITOR_LOGGED, MessageResponse, json_error, json_ok};
use crate::services::VisitorLogService;
use crate::utils::extract_client_ip;

/// Peers whose forwarding headers are honoured (empty = everyone)
#[derive(Clone, Debug, Default)]
pub struct TrustedProxies(pub Vec<String>);

/// Visitor logging endpoint
pub struct VisitorApi;

impl VisitorApi {
    /// `POST /api/log-visitor`
    pub async fn log_visitor(
        req: HttpRequest,
        service: web::Data<VisitorLogService>,
        trusted: Option<web::Data<TrustedProxies>>,
    ) -> impl Responder {
        let proxies = trusted.as_ref().map(|t| t.0.as_slice()).unwrap_or(&[]);
        let client_ip = extract_client_ip(&req, proxies);
        trace!("Received log-visitor request from {}", client_ip);

        match service.log_visitor(&client_ip).await {
            Ok(_) => json_ok(&MessageResponse {
                message: MSG_VISITOR_LOGGED.to_string(),
            }),
            Err(e) => json_error(&req, ERR_LOG_VISITOR, &e),
        }
    }
}
