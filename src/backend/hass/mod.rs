pub mod auth;
pub mod client;
pub mod frame;

use std::fmt::{self, Display};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::watch;
use url::Url;

use crate::backend::hass::auth::{AuthError, AuthProvider};
use crate::backend::hass::frame::{PageContext, connection_from_frontend};
use crate::error::ApiResult;

pub use self::client::{HassEntities, HassState, WsConnection};

pub const ERR_NO_FRONTEND_CONNECTION: &str = "Zashboard couldn't access the existing Home Assistant connection. Make sure you're opening Zashboard from inside the Home Assistant UI.";
pub const ERR_AUTH: &str = "Failed to get Home Assistant auth";
pub const ERR_CONNECT: &str = "Failed to connect to Home Assistant websocket";

/// An established Home Assistant session, as seen by the dashboard.
#[async_trait]
pub trait HassConnection: Clone + Send + Sync + 'static {
    /// Full entity snapshots. Every new value replaces the previous one.
    fn subscribe_entities(&self) -> watch::Receiver<HassEntities>;

    /// `true` while the connection is up. Flips to `false` (or the sender
    /// goes away) once it is lost.
    fn subscribe_connected(&self) -> watch::Receiver<bool>;

    async fn call_service(
        &self,
        domain: &str,
        service: &str,
        data: Map<String, Value>,
    ) -> ApiResult<Value>;
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

struct SessionInner<C> {
    connection: watch::Sender<Option<C>>,
    states: watch::Sender<HassEntities>,
    status: watch::Sender<ConnectionStatus>,
    error: watch::Sender<Option<String>>,
}

/// Observable Home Assistant connection state for one dashboard page.
pub struct HassSession<C: HassConnection> {
    inner: Arc<SessionInner<C>>,
}

impl<C: HassConnection> Clone for HassSession<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: HassConnection> Default for HassSession<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: HassConnection> HassSession<C> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionInner {
                connection: watch::Sender::new(None),
                states: watch::Sender::new(HassEntities::new()),
                status: watch::Sender::new(ConnectionStatus::Idle),
                error: watch::Sender::new(None),
            }),
        }
    }

    #[must_use]
    pub fn connection(&self) -> Option<C> {
        self.inner.connection.borrow().clone()
    }

    #[must_use]
    pub fn states(&self) -> HassEntities {
        self.inner.states.borrow().clone()
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.inner.status.borrow()
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.inner.error.borrow().clone()
    }

    #[must_use]
    pub fn subscribe_connection(&self) -> watch::Receiver<Option<C>> {
        self.inner.connection.subscribe()
    }

    #[must_use]
    pub fn subscribe_states(&self) -> watch::Receiver<HassEntities> {
        self.inner.states.subscribe()
    }

    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    #[must_use]
    pub fn subscribe_error(&self) -> watch::Receiver<Option<String>> {
        self.inner.error.subscribe()
    }

    fn fail(&self, msg: &str) {
        self.inner.error.send_replace(Some(msg.to_string()));
        self.inner.status.send_replace(ConnectionStatus::Error);
    }

    /// Acquire a Home Assistant connection for `page`.
    ///
    /// Pages embedded in the Home Assistant UI reuse the connection the UI
    /// exposes on one of its frames. Anything else authenticates through
    /// `auth`. The outcome is reported through the status and error
    /// channels, never as a return value.
    pub async fn init<A>(&self, page: &PageContext<C>, auth: &A)
    where
        A: AuthProvider<Connection = C>,
    {
        self.inner.status.send_replace(ConnectionStatus::Connecting);
        self.inner.error.send_replace(None);

        let hosting = page.hosting();
        if hosting.is_embedded() {
            log::info!("Running embedded in the Home Assistant UI ({hosting:?})");
            match connection_from_frontend(page.frame.clone()).await {
                Ok(Some(conn)) => self.adopt(conn),
                Ok(None) => self.fail(ERR_NO_FRONTEND_CONNECTION),
                Err(err) => {
                    log::error!("Failed to initialize Home Assistant websocket: {err}");
                    self.fail(ERR_CONNECT);
                }
            }
            return;
        }

        log::info!("Not embedded, authenticating directly");
        let creds = match auth.get_auth(None).await {
            Ok(creds) => creds,
            Err(AuthError::HostRequired) => match Self::page_origin(&page.location) {
                Ok(origin) => match auth.get_auth(Some(origin)).await {
                    Ok(creds) => creds,
                    Err(err) => {
                        log::error!("Failed to initialize Home Assistant websocket: {err}");
                        self.fail(ERR_CONNECT);
                        return;
                    }
                },
                Err(err) => {
                    log::error!("Failed to initialize Home Assistant websocket: {err}");
                    self.fail(ERR_CONNECT);
                    return;
                }
            },
            Err(err) => {
                log::error!("getAuth error: {err}");
                self.fail(ERR_AUTH);
                return;
            }
        };

        match auth.create_connection(&creds).await {
            Ok(conn) => self.adopt(conn),
            Err(err) => {
                log::error!("Failed to initialize Home Assistant websocket: {err}");
                self.fail(ERR_CONNECT);
            }
        }
    }

    /// `scheme://host[:port]` of the page.
    fn page_origin(location: &Url) -> ApiResult<Url> {
        Ok(Url::parse(&location.origin().ascii_serialization())?)
    }

    fn adopt(&self, conn: C) {
        let mut entities = conn.subscribe_entities();
        let mut connected = conn.subscribe_connected();

        self.inner
            .states
            .send_replace(entities.borrow_and_update().clone());
        self.inner.connection.send_replace(Some(conn));
        self.inner.status.send_replace(ConnectionStatus::Connected);

        let inner = self.inner.clone();
        tokio::spawn(async move {
            while entities.changed().await.is_ok() {
                let snapshot = entities.borrow_and_update().clone();
                inner.states.send_replace(snapshot);
            }
        });

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let _ = connected.wait_for(|up| !*up).await;
            log::warn!("Home Assistant connection lost");
            inner.status.send_replace(ConnectionStatus::Disconnected);
        });
    }

    /// Call a Home Assistant service on the current connection.
    ///
    /// Returns `Ok(None)` without doing anything if no connection has been
    /// acquired yet.
    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        data: Map<String, Value>,
    ) -> ApiResult<Option<Value>> {
        let Some(conn) = self.connection() else {
            log::warn!("No Home Assistant connection yet, cannot call service {domain}.{service}");
            return Ok(None);
        };

        conn.call_service(domain, service, data).await.map(Some)
    }
}
