use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use axum::Router;
use axum::routing::IntoMakeService;
use axum_server::Handle;

use crate::error::ApiResult;

pub struct HttpServer {
    addr: SocketAddr,
    handle: Handle,
}

impl HttpServer {
    #[must_use]
    pub fn http(listen_addr: IpAddr, listen_port: u16) -> Self {
        Self {
            addr: SocketAddr::from((listen_addr, listen_port)),
            handle: Handle::new(),
        }
    }

    /// Handle for stopping the server from elsewhere, e.g. a signal handler.
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    pub async fn run(self, svc: IntoMakeService<Router>) -> ApiResult<()> {
        log::info!("Opening listen port on {}", self.addr);
        axum_server::bind(self.addr)
            .handle(self.handle)
            .serve(svc)
            .await?;
        log::info!("Server on {} stopped", self.addr);
        Ok(())
    }
}

pub fn signal_stop(handle: &Handle) {
    handle.graceful_shutdown(Some(Duration::from_secs(1)));
}
