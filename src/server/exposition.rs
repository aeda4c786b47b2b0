//! Exposition Server
//!
//! Accept loop and request routing for a single target's `/metrics`
//! endpoint. The server only ever reads the registry.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::metrics::{TargetRegistry, EXPOSITION_CONTENT_TYPE};

/// Path the exposition text is served on.
pub const METRICS_PATH: &str = "/metrics";

/// Back-off after a failed accept (e.g. file descriptor exhaustion).
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// A bound, not yet serving, exposition listener.
pub struct ExpositionServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    registry: TargetRegistry,
}

impl ExpositionServer {
    /// Bind a listener on `addr` for `registry`.
    ///
    /// Binding happens eagerly so that a port conflict is reported to the
    /// caller instead of surfacing later inside a background task.
    pub async fn bind(addr: SocketAddr, registry: TargetRegistry) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            registry,
        })
    }

    /// Address the listener is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve connections until `cancel` fires.
    pub async fn serve(self, cancel: CancellationToken) {
        info!("Exposition server listening on {}", self.local_addr);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Exposition server on {} shutting down", self.local_addr);
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("Accepted scrape connection from {}", peer);
                        let registry = self.registry.clone();
                        let cancel = cancel.clone();
                        tokio::spawn(serve_connection(stream, registry, cancel));
                    }
                    Err(e) => {
                        warn!("Exposition server on {} accept error: {}", self.local_addr, e);
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
            }
        }
    }
}

impl std::fmt::Debug for ExpositionServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpositionServer")
            .field("local_addr", &self.local_addr)
            .field("registry", &self.registry)
            .finish()
    }
}

async fn serve_connection(stream: TcpStream, registry: TargetRegistry, cancel: CancellationToken) {
    let io = TokioIo::new(stream);
    let service = service_fn(move |req: Request<hyper::body::Incoming>| {
        let registry = registry.clone();
        async move { Ok::<_, Infallible>(respond(req.method(), req.uri().path(), &registry)) }
    });

    let conn = http1::Builder::new().serve_connection(io, service);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                debug!("Scrape connection error: {}", e);
            }
        }
        _ = cancel.cancelled() => {
            conn.as_mut().graceful_shutdown();
            if let Err(e) = conn.await {
                debug!("Scrape connection error during shutdown: {}", e);
            }
        }
    }
}

/// Build the response for a request on `path`.
pub fn respond(method: &Method, path: &str, registry: &TargetRegistry) -> Response<Full<Bytes>> {
    if path != METRICS_PATH {
        return empty(StatusCode::NOT_FOUND);
    }

    if *method != Method::GET && *method != Method::HEAD {
        let mut response = empty(StatusCode::METHOD_NOT_ALLOWED);
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
        return response;
    }

    match registry.render() {
        Ok(text) => {
            let mut response = Response::new(Full::new(Bytes::from(text)));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(EXPOSITION_CONTENT_TYPE));
            response
        }
        Err(e) => {
            error!("Failed to render {}: {}", registry.metric_name(), e);
            let mut response = Response::new(Full::new(Bytes::from(e.to_string())));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

fn empty(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}
