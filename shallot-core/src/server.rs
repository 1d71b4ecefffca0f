// HTTP/1 transport over hyper

use crate::Error;
use crate::application::Application;
use crate::logging::{debug, error, info, warn};
use crate::request::RemoteAddr;
use crate::response::Recorder;
use crate::routing::Routing;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Address used when no `AppConfig` is bound.
pub const DEFAULT_ADDR: &str = "0.0.0.0:3000";

impl<R: Routing> Application<R> {
    /// Listen on `HTTP_ADDR:HTTP_PORT` from the bound configuration, or
    /// on [`DEFAULT_ADDR`].
    pub async fn listen(self) -> Result<(), Error> {
        let addr = match self.config() {
            Some(config) => config.addr(),
            None => DEFAULT_ADDR.to_string(),
        };
        self.listen_on(&addr).await
    }

    /// Accept connections on `addr` until the process ends. Each request's
    /// chain runs on the blocking thread pool.
    pub async fn listen_on(self, addr: &str) -> Result<(), Error> {
        let listener = TcpListener::bind(addr).await?;
        let mode = self
            .config()
            .map(|config| config.run_mode.to_string())
            .unwrap_or_else(|| "DEV".to_string());
        info!(addr = %listener.local_addr()?, mode = %mode, "Shallot listening");

        let app = Arc::new(self);

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!(error = %err, "Failed to accept connection");
                    continue;
                }
            };
            let io = TokioIo::new(stream);
            let app = app.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let app = app.clone();
                    async move { Ok::<_, Infallible>(handle_request(app, req, peer).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    debug!(peer = %peer, error = %err, "Error serving connection");
                }
            });
        }
    }
}

async fn handle_request<R: Routing>(
    app: Arc<Application<R>>,
    req: Request<Incoming>,
    peer: SocketAddr,
) -> Response<Full<Bytes>> {
    let (mut parts, body) = req.into_parts();
    parts.extensions.insert(RemoteAddr(peer));
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            debug!(error = %err, "Failed to read request body");
            return status_response(StatusCode::BAD_REQUEST);
        }
    };
    let request = http::Request::from_parts(parts, body);

    let recorder = Recorder::new();
    let sink = recorder.clone();
    if let Err(err) = tokio::task::spawn_blocking(move || app.serve(request, sink)).await {
        error!(error = %err, "Request task failed");
        return status_response(StatusCode::INTERNAL_SERVER_ERROR);
    }

    match recorder.into_response() {
        Ok(response) => response.map(Full::new),
        Err(err) => {
            error!(error = %err, "Failed to build response");
            status_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn status_response(status: StatusCode) -> Response<Full<Bytes>> {
    let reason = status.canonical_reason().unwrap_or("");
    let mut response = Response::new(Full::new(Bytes::from(reason)));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_response() {
        let response = status_response(StatusCode::BAD_REQUEST);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_serves_over_tcp() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let mut app = Application::new();
        app.get("/ping", || "pong").unwrap();

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let addr_string = addr.to_string();
        tokio::spawn(async move {
            let _ = app.listen_on(&addr_string).await;
        });

        let mut stream = None;
        for _ in 0..50 {
            match tokio::net::TcpStream::connect(addr).await {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(_) => tokio::time::sleep(std::time::Duration::from_millis(20)).await,
            }
        }
        let mut stream = stream.expect("server did not start");

        stream
            .write_all(b"GET /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        assert!(raw.starts_with("HTTP/1.1 200 OK"), "{raw}");
        assert!(raw.ends_with("pong"), "{raw}");
    }
}
