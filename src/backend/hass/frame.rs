use std::collections::HashSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;
use url::Url;

use crate::backend::hass::HassConnection;
use crate::error::ApiResult;

/// Upper bound on how many ancestor frames are probed.
pub const MAX_FRAME_DEPTH: usize = 10;

const INGRESS_PATH: &str = "/api/hassio_ingress";
const REMOTE_UI_SUFFIX: &str = ".ui.nabu.casa";

/// Where the dashboard page is being served from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HostingContext {
    /// Supervisor ingress, embedded in the Home Assistant UI.
    Ingress,
    /// Home Assistant Cloud remote UI.
    RemoteUi,
    Standalone,
}

impl HostingContext {
    #[must_use]
    pub fn classify(location: &Url) -> Self {
        if location.path().contains(INGRESS_PATH) {
            return Self::Ingress;
        }

        let remote = location
            .host_str()
            .is_some_and(|host| host.ends_with(REMOTE_UI_SUFFIX));

        if remote { Self::RemoteUi } else { Self::Standalone }
    }

    /// Embedded pages must reuse the host UI's connection; they never
    /// authenticate on their own.
    #[must_use]
    pub const fn is_embedded(self) -> bool {
        matches!(self, Self::Ingress | Self::RemoteUi)
    }
}

/// What a frame hands out once its connection promise settles.
///
/// Home Assistant exposes either the connection itself or an object
/// carrying it in a `conn` field, which may be empty.
pub enum ExposedConnection<C> {
    Wrapped { conn: Option<C> },
    Bare(C),
}

impl<C> ExposedConnection<C> {
    pub fn into_connection(self) -> Option<C> {
        match self {
            Self::Wrapped { conn } => conn,
            Self::Bare(conn) => Some(conn),
        }
    }
}

pub type PendingConnection<C> = BoxFuture<'static, ApiResult<ExposedConnection<C>>>;

/// Inspecting a frame was refused, typically because it lives on
/// another origin.
#[derive(Error, Debug)]
#[error("Cannot inspect frame: {0}")]
pub struct ProbeError(pub String);

/// A browsing context the page lives in, seen from the page.
pub trait Frame<C: HassConnection>: Send + Sync {
    fn parent(&self) -> Option<Arc<dyn Frame<C>>>;

    /// The frame's in-flight Home Assistant connection, if it exposes one.
    fn hass_connection(&self) -> Result<Option<PendingConnection<C>>, ProbeError>;
}

/// A frame with no parent that exposes nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct TopLevelFrame;

impl<C: HassConnection> Frame<C> for TopLevelFrame {
    fn parent(&self) -> Option<Arc<dyn Frame<C>>> {
        None
    }

    fn hass_connection(&self) -> Result<Option<PendingConnection<C>>, ProbeError> {
        Ok(None)
    }
}

/// The page a session is started from.
pub struct PageContext<C: HassConnection> {
    pub location: Url,
    pub frame: Arc<dyn Frame<C>>,
}

impl<C: HassConnection> PageContext<C> {
    pub fn new(location: Url, frame: Arc<dyn Frame<C>>) -> Self {
        Self { location, frame }
    }

    /// A page loaded directly, outside of any other frame.
    pub fn top_level(location: Url) -> Self {
        Self::new(location, Arc::new(TopLevelFrame))
    }

    #[must_use]
    pub fn hosting(&self) -> HostingContext {
        HostingContext::classify(&self.location)
    }
}

fn frame_key<C: HassConnection>(frame: &Arc<dyn Frame<C>>) -> *const () {
    Arc::as_ptr(frame).cast::<()>()
}

/// Walk from `frame` up through its ancestors and return the first
/// exposed connection promise.
///
/// Stops at the first frame that cannot be inspected, at a frame seen
/// before, or after [`MAX_FRAME_DEPTH`] frames.
pub fn find_hass_connection<C: HassConnection>(
    frame: Arc<dyn Frame<C>>,
) -> Option<PendingConnection<C>> {
    let mut visited = HashSet::new();
    let mut current = Some(frame);

    for _ in 0..MAX_FRAME_DEPTH {
        let Some(frame) = current.take() else {
            break;
        };

        if !visited.insert(frame_key(&frame)) {
            log::debug!("Frame chain loops back on itself");
            break;
        }

        match frame.hass_connection() {
            Ok(Some(pending)) => return Some(pending),
            Ok(None) => {}
            Err(err) => {
                log::warn!("Stopped looking for a Home Assistant connection: {err}");
                break;
            }
        }

        current = frame.parent();
    }

    None
}

/// Resolve the connection exposed by the surrounding UI, if any.
pub async fn connection_from_frontend<C: HassConnection>(
    frame: Arc<dyn Frame<C>>,
) -> ApiResult<Option<C>> {
    match find_hass_connection(frame) {
        Some(pending) => Ok(pending.await?.into_connection()),
        None => Ok(None),
    }
}
