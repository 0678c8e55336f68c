pub mod counter;
pub mod frontend;
pub mod health;
pub mod types;
pub mod visitor;

use actix_web::web;

pub use counter::CounterApi;
pub use frontend::{FrontendService, frontend_routes};
pub use health::{AppStartTime, HealthService, health_routes};
pub use visitor::{TrustedProxies, VisitorApi};

/// `/api` 路由
pub fn api_routes() -> actix_web::Scope {
    web::scope("/api")
        .route("/update-count", web::post().to(CounterApi::update_count))
        .route("/visitor-count", web::get().to(CounterApi::visitor_count))
        .route("/log-visitor", web::post().to(VisitorApi::log_visitor))
}
