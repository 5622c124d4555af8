use async_trait::async_trait;
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::dashboard::DashboardConfig;
use crate::error::{ZashboardError, ZashboardResult};
use crate::normalize::normalize;

/// Reply body of a successful `POST /api/dashboard`.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct SaveResponse {
    pub success: bool,
}

/// Body of every non-success reply from the dashboard server.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

/// Where the dashboard state store reads and writes the configuration.
#[async_trait]
pub trait DashboardBackend: Send + Sync {
    async fn load(&self) -> ZashboardResult<DashboardConfig>;

    async fn save(&self, config: &DashboardConfig) -> ZashboardResult<()>;
}

#[derive(Clone, Debug)]
pub struct Client {
    http: reqwest::Client,
    base: Url,
}

impl Client {
    /// `base` is the API root, e.g. `http://localhost:8099/api/`.
    #[must_use]
    pub fn new(base: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base,
        }
    }

    pub fn from_server(server: &Url) -> ZashboardResult<Self> {
        Ok(Self::new(server.join("api/")?))
    }

    fn url(&self, path: &str) -> ZashboardResult<Url> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    async fn check(response: Response) -> ZashboardResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let msg = match response.json::<ErrorResponse>().await {
            Ok(err) if !err.error.is_empty() => err.error,
            _ => format!("HTTP {}", status.as_u16()),
        };

        Err(ZashboardError::ServerError(msg))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ZashboardResult<T> {
        let response = self.http.get(self.url(path)?).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ZashboardResult<T> {
        let response = self.http.post(self.url(path)?).json(body).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Fetch the stored dashboard, repaired the same way the server does.
    pub async fn dashboard(&self) -> ZashboardResult<DashboardConfig> {
        let raw: Value = self.get("dashboard").await?;
        normalize(&raw).ok_or(ZashboardError::InvalidDashboard)
    }

    pub async fn save_dashboard(&self, config: &DashboardConfig) -> ZashboardResult<SaveResponse> {
        self.post("dashboard", config).await
    }
}

#[async_trait]
impl DashboardBackend for Client {
    async fn load(&self) -> ZashboardResult<DashboardConfig> {
        self.dashboard().await
    }

    async fn save(&self, config: &DashboardConfig) -> ZashboardResult<()> {
        self.save_dashboard(config).await?;
        Ok(())
    }
}
