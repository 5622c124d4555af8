use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::error::ApiResult;
use crate::model::dashboard::DashboardFile;

#[derive(Clone)]
pub struct AppState {
    conf: Arc<AppConfig>,
    dashboard: Arc<Mutex<DashboardFile>>,
}

impl AppState {
    pub fn from_config(config: AppConfig) -> ApiResult<Self> {
        let dashboard = DashboardFile::open(config.dashboard_file())?;
        log::debug!("Dashboard file is {}", dashboard.path());

        Ok(Self {
            conf: Arc::new(config),
            dashboard: Arc::new(Mutex::new(dashboard)),
        })
    }

    #[must_use]
    pub fn config(&self) -> Arc<AppConfig> {
        self.conf.clone()
    }

    /// The dashboard document. Reads and writes within this process are
    /// serialized through the lock.
    #[must_use]
    pub fn dashboard(&self) -> Arc<Mutex<DashboardFile>> {
        self.dashboard.clone()
    }
}
