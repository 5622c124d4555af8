pub mod appstate;
#[cfg(feature = "server-banner")]
pub mod banner;
pub mod http;

use axum::Router;
use axum::routing::IntoMakeService;
use tower_http::trace::TraceLayer;

use crate::routes;
use crate::server::appstate::AppState;

pub fn build_router(appstate: AppState) -> Router {
    let static_dir = appstate.config().resolve_static_dir();
    if !static_dir.join("index.html").is_file() {
        log::warn!("No web UI found in {static_dir}, only the API will be usable");
    }
    log::info!("Serving web UI from {static_dir}");

    routes::router(&static_dir)
        .with_state(appstate)
        .layer(TraceLayer::new_for_http())
}

pub fn build_service(appstate: AppState) -> IntoMakeService<Router> {
    build_router(appstate).into_make_service()
}
