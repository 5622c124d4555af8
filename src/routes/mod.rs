pub mod dashboard;
pub mod extractor;
pub mod ui;

use axum::Router;
use camino::Utf8Path;

use crate::server::appstate::AppState;

pub fn router(static_dir: &Utf8Path) -> Router<AppState> {
    Router::new()
        .nest("/api", dashboard::router())
        .merge(ui::router(static_dir))
}
