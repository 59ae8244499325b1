//! Shared utilities for integration testing.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use article_service::config::TracingConfig;
use article_service::lifecycle::Shutdown;
use article_service::HttpServer;
use article_service::ServiceConfig;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};

/// Tracing config pointing at `addr` over plain HTTP.
///
/// The scheduled delay is long so spans stay buffered until shutdown.
#[allow(dead_code)]
pub fn tracing_config(addr: SocketAddr) -> TracingConfig {
    let mut config = TracingConfig {
        endpoint: addr.to_string(),
        insecure: true,
        ..TracingConfig::default()
    };
    config.batch.scheduled_delay_ms = 60_000;
    config
}

/// Read one HTTP request and return its request line.
fn read_request(socket: &mut TcpStream) -> Option<String> {
    socket.set_read_timeout(Some(Duration::from_secs(5))).ok()?;

    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&data[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while data.len() < header_end + content_length {
        let n = socket.read(&mut buf).ok()?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }

    head.lines().next().map(str::to_string)
}

/// OTLP collector stand-in that accepts every export with `200 OK`.
#[allow(dead_code)]
pub struct MockCollector {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl MockCollector {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = requests.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut socket) = stream else { break };
                let seen = seen.clone();
                thread::spawn(move || {
                    while let Some(line) = read_request(&mut socket) {
                        seen.lock().unwrap().push(line);
                        let response = "HTTP/1.1 200 OK\r\n\
                                        Content-Type: application/x-protobuf\r\n\
                                        Content-Length: 0\r\n\r\n";
                        if socket.write_all(response.as_bytes()).is_err() {
                            break;
                        }
                    }
                });
            }
        });

        Self { addr, requests }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Request lines received so far, e.g. `POST /v1/traces HTTP/1.1`.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Collector that reads exports but never answers.
#[allow(dead_code)]
pub fn start_silent_collector() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming() {
            let Ok(mut socket) = stream else { break };
            let _ = read_request(&mut socket);
            held.push(socket);
        }
    });

    addr
}

/// A running service whose spans land in memory.
#[allow(dead_code)]
pub struct TestService {
    pub addr: SocketAddr,
    pub provider: SdkTracerProvider,
    pub exporter: InMemorySpanExporter,
    pub shutdown: Shutdown,
    pub handle: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

#[allow(dead_code)]
impl TestService {
    pub async fn start() -> Self {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let tracer = provider.tracer("article-service");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let shutdown = Shutdown::new();
        let server = HttpServer::new(ServiceConfig::default(), tracer);
        let server_shutdown = shutdown.subscribe();
        let handle = tokio::spawn(async move { server.run(listener, server_shutdown).await });

        Self {
            addr,
            provider,
            exporter,
            shutdown,
            handle,
        }
    }

    pub fn url(&self, target: &str) -> String {
        format!("http://{}{}", self.addr, target)
    }

    pub fn spans(&self) -> Vec<SpanData> {
        self.exporter.get_finished_spans().unwrap()
    }

    pub fn span(&self, name: &str) -> SpanData {
        self.spans()
            .into_iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("no span named {name:?}"))
    }
}

/// String value of attribute `key` on `span`.
#[allow(dead_code)]
pub fn attr(span: &SpanData, key: &str) -> Option<String> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.as_str().into_owned())
}
