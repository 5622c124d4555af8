use std::net::IpAddr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub bind_address: IpAddr,
    pub data_dir: Utf8PathBuf,
    #[serde(default)]
    pub static_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub hass_url: Option<Url>,
    #[serde(default)]
    pub hass_token: Option<String>,
}

impl AppConfig {
    pub const DASHBOARD_FILE: &'static str = "dashboard.yaml";

    #[must_use]
    pub fn dashboard_file(&self) -> Utf8PathBuf {
        self.data_dir.join(Self::DASHBOARD_FILE)
    }

    /// Directory holding the compiled front end.
    ///
    /// An explicitly configured directory wins. Otherwise the container
    /// location is preferred over a development checkout.
    #[must_use]
    pub fn resolve_static_dir(&self) -> Utf8PathBuf {
        if let Some(dir) = &self.static_dir {
            return dir.clone();
        }

        let docker_path = Utf8Path::new("/app/web/dist");
        if docker_path.is_dir() {
            return docker_path.to_path_buf();
        }

        let dev_path = Utf8Path::new("web/dist");
        if dev_path.is_dir() {
            return dev_path.to_path_buf();
        }

        docker_path.to_path_buf()
    }
}
