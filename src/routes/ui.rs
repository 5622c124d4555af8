use axum::Router;
use axum::extract::Request;
use axum::http::header;
use axum::middleware::{self, Next};
use axum::response::Response;
use camino::Utf8Path;
use tower_http::services::{ServeDir, ServeFile};

use crate::server::appstate::AppState;

fn looks_like_asset(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .is_some_and(|part| part.contains('.'))
}

async fn ui_cache_control(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let mut res = next.run(req).await;

    // hashed bundles are immutable, the html shell must never be cached
    let cache = if looks_like_asset(&path) {
        "public, max-age=31536000, immutable"
    } else {
        "no-store"
    };

    res.headers_mut()
        .insert(header::CACHE_CONTROL, header::HeaderValue::from_static(cache));

    res
}

/// Serve the compiled front end from `static_dir`. Paths that do not name
/// a file get `index.html`, so client-side routes survive a reload.
pub fn router(static_dir: &Utf8Path) -> Router<AppState> {
    let index_file = static_dir.join("index.html");
    let ui_assets = ServeDir::new(static_dir).fallback(ServeFile::new(index_file));

    Router::new()
        .fallback_service(ui_assets)
        .layer(middleware::from_fn(ui_cache_control))
}
