use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use zashboard_api::config::AppConfig;

use crate::backend::hass::HassConnection;
use crate::backend::hass::client::WsConnection;
use crate::error::ApiResult;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No Home Assistant address is known; the caller may retry with one.
    #[error("Home Assistant URL is required")]
    HostRequired,

    #[error("No Home Assistant access token configured")]
    MissingToken,

    #[error("Home Assistant rejected the access token")]
    InvalidAuth,
}

#[derive(Clone, Debug)]
pub struct HassAuth {
    pub hass_url: Url,
    pub access_token: String,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    type Connection: HassConnection;

    /// Obtain credentials, optionally for an explicit Home Assistant address.
    async fn get_auth(&self, hass_url: Option<Url>) -> Result<HassAuth, AuthError>;

    async fn create_connection(&self, auth: &HassAuth) -> ApiResult<Self::Connection>;
}

/// Long-lived access token auth, as used by add-ons and standalone installs.
#[derive(Clone, Debug, Default)]
pub struct TokenAuth {
    hass_url: Option<Url>,
    token: Option<String>,
}

impl TokenAuth {
    #[must_use]
    pub const fn new(hass_url: Option<Url>, token: Option<String>) -> Self {
        Self { hass_url, token }
    }

    #[must_use]
    pub fn from_config(conf: &AppConfig) -> Self {
        Self::new(conf.hass_url.clone(), conf.hass_token.clone())
    }
}

#[async_trait]
impl AuthProvider for TokenAuth {
    type Connection = WsConnection;

    async fn get_auth(&self, hass_url: Option<Url>) -> Result<HassAuth, AuthError> {
        let hass_url = hass_url
            .or_else(|| self.hass_url.clone())
            .ok_or(AuthError::HostRequired)?;

        let access_token = self
            .token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?
            .to_string();

        Ok(HassAuth {
            hass_url,
            access_token,
        })
    }

    async fn create_connection(&self, auth: &HassAuth) -> ApiResult<Self::Connection> {
        WsConnection::connect(auth).await
    }
}
