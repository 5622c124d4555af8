use axum::Router;
use axum::extract::State;
use axum::routing::get;
use serde_json::Value;

use zashboard_api::client::SaveResponse;
use zashboard_api::dashboard::DashboardConfig;
use zashboard_api::normalize::normalize;

use crate::error::{ApiError, ApiResult};
use crate::routes::extractor::Json;
use crate::server::appstate::AppState;

async fn get_dashboard(State(state): State<AppState>) -> ApiResult<Json<DashboardConfig>> {
    let dashboard = state.dashboard();
    let config = dashboard.lock().await.load();
    Ok(Json(config))
}

async fn post_dashboard(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> ApiResult<Json<SaveResponse>> {
    let config = normalize(&payload).ok_or(ApiError::InvalidPayload)?;

    let dashboard = state.dashboard();
    let lock = dashboard.lock().await;
    lock.save(&config).map_err(|err| {
        log::error!("Failed to save {}: {err}", lock.path());
        ApiError::SaveFailed
    })?;
    drop(lock);

    log::info!("Saved dashboard with {} room(s)", config.rooms.len());

    Ok(Json(SaveResponse { success: true }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(get_dashboard).post(post_dashboard))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use camino::Utf8PathBuf;
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use zashboard_api::dashboard::DashboardConfig;

    use crate::server::appstate::tests::state;
    use crate::server::build_router;

    struct Fixture {
        data: TempDir,
        _web: TempDir,
        app: Router,
    }

    impl Fixture {
        fn new() -> Self {
            let data = tempfile::tempdir().unwrap();
            let web = tempfile::tempdir().unwrap();
            fs::write(web.path().join("index.html"), "<html>zashboard</html>").unwrap();

            let data_dir = Utf8PathBuf::from_path_buf(data.path().to_path_buf()).unwrap();
            let web_dir = Utf8PathBuf::from_path_buf(web.path().to_path_buf()).unwrap();
            let app = build_router(state(&data_dir, &web_dir));

            Self {
                data,
                _web: web,
                app,
            }
        }

        fn dashboard_file(&self) -> std::path::PathBuf {
            self.data.path().join("dashboard.yaml")
        }

        async fn get(&self, uri: &str) -> (StatusCode, Vec<u8>) {
            let req = Request::get(uri).body(Body::empty()).unwrap();
            let res = self.app.clone().oneshot(req).await.unwrap();
            let status = res.status();
            let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
            (status, body.to_vec())
        }

        async fn post(&self, body: &str) -> (StatusCode, Value) {
            let req = Request::post("/api/dashboard")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap();
            let res = self.app.clone().oneshot(req).await.unwrap();
            let status = res.status();
            let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
            (status, serde_json::from_slice(&body).unwrap())
        }

        async fn dashboard(&self) -> Value {
            let (status, body) = self.get("/api/dashboard").await;
            assert_eq!(status, StatusCode::OK);
            serde_json::from_slice(&body).unwrap()
        }
    }

    #[tokio::test]
    async fn fresh_get_returns_and_writes_default() {
        let fx = Fixture::new();
        assert!(!fx.dashboard_file().exists());

        let body = fx.dashboard().await;

        assert_eq!(body, serde_json::to_value(DashboardConfig::default()).unwrap());
        assert_eq!(body["sidebar"]["title"], "Zashboard");
        assert_eq!(body["rooms"][0]["id"], "living-room");
        assert_eq!(body["rooms"][1]["id"], "bedroom");
        assert!(fx.dashboard_file().is_file());
    }

    #[tokio::test]
    async fn post_then_get() {
        let fx = Fixture::new();

        let (status, body) = fx.post(r#"{"rooms":[{"title":"Kitchen"}]}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true}));

        let body = fx.dashboard().await;
        assert_eq!(body["sidebar"]["title"], "Zashboard");
        assert_eq!(
            body["rooms"],
            json!([{
                "id": "room-1",
                "title": "Kitchen",
                "objects": []
            }])
        );
    }

    #[tokio::test]
    async fn post_without_rooms_is_rejected() {
        let fx = Fixture::new();
        fx.dashboard().await;
        let before = fs::read_to_string(fx.dashboard_file()).unwrap();

        for payload in [r#"{"sidebar":{"title":"X"}}"#, r#"{"rooms":"nope"}"#, "[1,2]"] {
            let (status, body) = fx.post(payload).await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, json!({"error": "Invalid dashboard payload"}));
        }

        assert_eq!(fs::read_to_string(fx.dashboard_file()).unwrap(), before);
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let fx = Fixture::new();

        let (status, body) = fx.post("{rooms: [").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Invalid dashboard payload"}));
        assert!(!fx.dashboard_file().exists());
    }

    #[tokio::test]
    async fn save_failure_is_reported() {
        let fx = Fixture::new();
        // a directory where the file should be makes the write fail
        fs::create_dir(fx.dashboard_file()).unwrap();

        let (status, body) = fx.post(r#"{"rooms":[]}"#).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Failed to save dashboard.yaml"}));
    }

    #[tokio::test]
    async fn unknown_paths_serve_the_app() {
        let fx = Fixture::new();

        let (status, body) = fx.get("/rooms/kitchen").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"<html>zashboard</html>");
    }
}
