use actix_web::{HttpRequest, HttpResponse, Result, web};
use rust_embed::Embed;
use tracing::{debug, trace};

// 使用 RustEmbed 自动嵌入静态文件
#[derive(Embed)]
#[folder = "public/"]
struct PublicAssets;

pub struct FrontendService;

impl FrontendService {
    /// `GET /` 返回 index.html
    pub async fn handle_index() -> Result<HttpResponse> {
        trace!("Serving index.html");

        match PublicAssets::get("index.html") {
            Some(content) => Ok(HttpResponse::Ok()
                .content_type("text/html; charset=utf-8")
                .body(content.data.into_owned())),
            None => Ok(HttpResponse::NotFound().body("index.html not found")),
        }
    }

    /// 处理 public/ 下的其他静态文件
    pub async fn handle_static(req: HttpRequest) -> Result<HttpResponse> {
        let path = req.match_info().query("path");
        trace!("Serving static file: {}", path);

        if path.is_empty() {
            return Self::handle_index().await;
        }

        match PublicAssets::get(path) {
            Some(content) => Ok(HttpResponse::Ok()
                .content_type(Self::get_content_type(path))
                .body(content.data.into_owned())),
            None => {
                debug!("Static file not found: {}", path);
                Ok(HttpResponse::NotFound().body("File not found"))
            }
        }
    }

    /// 根据文件扩展名确定 Content-Type
    fn get_content_type(path: &str) -> &'static str {
        match path.rsplit('.').next() {
            Some("html") | Some("htm") => "text/html; charset=utf-8",
            Some("css") => "text/css",
            Some("js") => "application/javascript",
            Some("json") => "application/json",
            Some("png") => "image/png",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("gif") => "image/gif",
            Some("svg") => "image/svg+xml",
            Some("ico") => "image/x-icon",
            Some("txt") => "text/plain; charset=utf-8",
            Some("woff") => "font/woff",
            Some("woff2") => "font/woff2",
            _ => "application/octet-stream",
        }
    }
}

/// 静态页面路由，需要最后注册（通配路径）
pub fn frontend_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(FrontendService::handle_index))
        .route("/{path:.*}", web::get().to(FrontendService::handle_static));
}
