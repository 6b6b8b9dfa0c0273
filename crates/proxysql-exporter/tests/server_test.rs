//! Serving over a real socket.

use std::net::SocketAddr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use proxysql_exporter::{BasicAuth, ExporterServer};
use proxysql_exporter_config::ExporterSettings;
use proxysql_exporter_telemetry::metrics::{build_recorder, set_build_info, set_collector_enabled};
use proxysql_exporter_telemetry::{MetricsConfig, MetricsRegistry};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

async fn start(
    registry: MetricsRegistry,
    auth: Option<BasicAuth>,
) -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let server = ExporterServer::new(&ExporterSettings::default(), registry, auth).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        server
            .serve(listener, async {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });

    (address, tx, task)
}

async fn request(address: SocketAddr, path: &str, authorization: Option<&str>) -> String {
    let mut stream = TcpStream::connect(address).await.unwrap();
    let mut raw = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n");
    if let Some(value) = authorization {
        raw.push_str(&format!("Authorization: {value}\r\n"));
    }
    raw.push_str("\r\n");
    stream.write_all(raw.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn serves_metrics_and_landing_page() {
    let recorder = build_recorder(&MetricsConfig::default()).unwrap();
    let registry = MetricsRegistry::new(recorder.handle());
    metrics::with_local_recorder(&recorder, || {
        set_build_info("9.9.9");
        set_collector_enabled("mysql_status", true);
    });

    let (address, shutdown, task) = start(registry, None).await;

    let metrics = request(address, "/metrics", None).await;
    assert!(metrics.starts_with("HTTP/1.1 200"), "{metrics}");
    assert!(metrics.contains("text/plain; version=0.0.4"));
    assert!(metrics.contains(r#"proxysql_exporter_build_info{version="9.9.9"} 1"#));
    assert!(metrics.contains(r#"proxysql_exporter_collector_enabled{collector="mysql_status"} 1"#));

    let landing = request(address, "/", None).await;
    assert!(landing.starts_with("HTTP/1.1 200"));
    assert!(landing.contains("<a href=\"/metrics\">Metrics</a>"));

    shutdown.send(()).unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn basic_auth_guards_every_path() {
    let (address, shutdown, task) =
        start(MetricsRegistry::disabled(), Some(BasicAuth::new("prometheus", "s3cret"))).await;

    let denied = request(address, "/metrics", None).await;
    assert!(denied.starts_with("HTTP/1.1 401"), "{denied}");
    assert!(denied.to_lowercase().contains("www-authenticate: basic realm=\"proxysql_exporter\""));

    let denied_landing = request(address, "/", None).await;
    assert!(denied_landing.starts_with("HTTP/1.1 401"));

    let header = format!("Basic {}", STANDARD.encode("prometheus:s3cret"));
    let allowed = request(address, "/metrics", Some(&header)).await;
    assert!(allowed.starts_with("HTTP/1.1 200"), "{allowed}");

    shutdown.send(()).unwrap();
    task.await.unwrap();
}
