//! Metrics HTTP server.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::header::{HeaderValue, ALLOW, AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use http::{Method, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use proxysql_exporter_config::ExporterSettings;
use proxysql_exporter_telemetry::metrics::record_scrape;
use proxysql_exporter_telemetry::MetricsRegistry;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::BasicAuth;
use crate::error::{ExporterError, ExporterResult};

/// Content type of the Prometheus text exposition format.
pub const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Answers requests. Shared by every connection.
#[derive(Debug)]
pub struct MetricsHandler {
    telemetry_path: String,
    landing_page: Bytes,
    registry: MetricsRegistry,
    auth: Option<BasicAuth>,
}

impl MetricsHandler {
    /// Create a handler serving `registry` at the configured telemetry path.
    pub fn new(settings: &ExporterSettings, registry: MetricsRegistry, auth: Option<BasicAuth>) -> Self {
        Self {
            telemetry_path: settings.web.telemetry_path.clone(),
            landing_page: landing_page(&settings.web.telemetry_path),
            registry,
            auth,
        }
    }

    /// Build the response for `req`.
    pub fn respond<B>(&self, req: &Request<B>) -> Response<Full<Bytes>> {
        if let Some(auth) = &self.auth {
            if !auth.authorize(req.headers().get(AUTHORIZATION)) {
                warn!(path = %req.uri().path(), "rejected unauthenticated request");
                let mut response = text_response(StatusCode::UNAUTHORIZED, "Unauthorized\n");
                response
                    .headers_mut()
                    .insert(WWW_AUTHENTICATE, BasicAuth::challenge());
                return response;
            }
        }

        if *req.method() != Method::GET && *req.method() != Method::HEAD {
            let mut response = text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed\n");
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
            return response;
        }

        if req.uri().path() == self.telemetry_path {
            let start = Instant::now();
            let body = self.registry.render();
            record_scrape(start.elapsed());
            return with_content_type(
                Response::new(Full::new(Bytes::from(body))),
                METRICS_CONTENT_TYPE,
            );
        }

        with_content_type(
            Response::new(Full::new(self.landing_page.clone())),
            "text/html; charset=utf-8",
        )
    }
}

/// Plain HTTP server for the exporter.
#[derive(Debug)]
pub struct ExporterServer {
    address: SocketAddr,
    handler: Arc<MetricsHandler>,
}

impl ExporterServer {
    /// Create a server for the resolved settings.
    ///
    /// # Errors
    ///
    /// Returns `ExporterError::TlsUnsupported` when TLS files are configured,
    /// or a configuration error if the listen address is invalid.
    pub fn new(
        settings: &ExporterSettings,
        registry: MetricsRegistry,
        auth: Option<BasicAuth>,
    ) -> ExporterResult<Self> {
        if settings.tls_enabled() {
            return Err(ExporterError::TlsUnsupported {
                cert_file: settings.web.ssl_cert_file.clone(),
                key_file: settings.web.ssl_key_file.clone(),
            });
        }

        Ok(Self {
            address: settings.listen_socket_addr()?,
            handler: Arc::new(MetricsHandler::new(settings, registry, auth)),
        })
    }

    /// Address the server binds to.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Bind and serve until Ctrl-C.
    pub async fn run(self) -> ExporterResult<()> {
        let listener = TcpListener::bind(self.address)
            .await
            .map_err(|e| ExporterError::bind(self.address, e))?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve connections from `listener` until `shutdown` completes.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> ExporterResult<()>
    where
        F: Future<Output = ()>,
    {
        let local = listener.local_addr().unwrap_or(self.address);
        info!(address = %local, telemetry_path = %self.handler.telemetry_path, "Listening");

        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                () = &mut shutdown => {
                    info!("Shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                        continue;
                    }
                },
            };

            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req: Request<Incoming>| {
                    let handler = Arc::clone(&handler);
                    async move { Ok::<_, Infallible>(handler.respond(&req)) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!(peer = %peer, error = %e, "Connection error");
                }
            });
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
}

fn landing_page(telemetry_path: &str) -> Bytes {
    Bytes::from(format!(
        "<html>\n<head>\n\t<title>ProxySQL exporter</title>\n</head>\n<body>\n\t<h1>ProxySQL exporter</h1>\n\t<p><a href=\"{telemetry_path}\">Metrics</a></p>\n</body>\n</html>\n"
    ))
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = with_content_type(
        Response::new(Full::new(Bytes::from_static(body.as_bytes()))),
        "text/plain; charset=utf-8",
    );
    *response.status_mut() = status;
    response
}

fn with_content_type(mut response: Response<Full<Bytes>>, content_type: &'static str) -> Response<Full<Bytes>> {
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
