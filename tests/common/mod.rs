//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chat_gateway::config::GatewayConfig;
use chat_gateway::http::HttpServer;
use chat_gateway::lifecycle::Shutdown;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// What the mock backend does with a request.
#[allow(dead_code)]
pub enum Script {
    /// Write the text plus a newline, then wait for the client to hang up.
    Line(String),
    /// Wait, then behave like `Line`.
    Delayed(Duration, String),
    /// Write the text without a newline and close the connection.
    CloseAfter(String),
    /// Never answer; wait for the client to hang up.
    Hang,
}

/// A line-protocol backend that records what it receives.
#[derive(Clone)]
pub struct MockBackend {
    pub addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Value>>>,
}

#[allow(dead_code)]
impl MockBackend {
    /// Connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Connections the client has closed (or the mock closed itself).
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Decoded request lines in arrival order.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    /// Wait until at least `n` connections have been accepted.
    pub async fn wait_accepted(&self, n: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.accepted() < n {
            assert!(tokio::time::Instant::now() < deadline, "backend never called");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Wait until every accepted connection has been closed.
    pub async fn wait_all_closed(&self) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.closed() < self.accepted() {
            assert!(tokio::time::Instant::now() < deadline, "backend sockets left open");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Start a programmable backend on an ephemeral port.
pub async fn start_backend<F>(script: F) -> MockBackend
where
    F: Fn(&Value) -> Script + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = MockBackend {
        addr: listener.local_addr().unwrap(),
        accepted: Arc::new(AtomicUsize::new(0)),
        closed: Arc::new(AtomicUsize::new(0)),
        requests: Arc::new(Mutex::new(Vec::new())),
    };
    let script = Arc::new(script);
    let shared = backend.clone();

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else { break };
            shared.accepted.fetch_add(1, Ordering::SeqCst);

            let script = script.clone();
            let shared = shared.clone();
            tokio::spawn(async move {
                let (read, mut write) = socket.into_split();
                let mut reader = BufReader::new(read);
                let mut line = String::new();

                if reader.read_line(&mut line).await.unwrap_or(0) > 0 {
                    let request: Value = serde_json::from_str(line.trim()).unwrap_or(Value::Null);
                    shared.requests.lock().unwrap().push(request.clone());

                    let answer = match script(&request) {
                        Script::Line(text) => Some(format!("{text}\n")),
                        Script::Delayed(delay, text) => {
                            tokio::time::sleep(delay).await;
                            Some(format!("{text}\n"))
                        }
                        Script::CloseAfter(text) => {
                            let _ = write.write_all(text.as_bytes()).await;
                            let _ = write.shutdown().await;
                            None
                        }
                        Script::Hang => None,
                    };
                    if let Some(answer) = answer {
                        let _ = write.write_all(answer.as_bytes()).await;
                    }
                }

                // EOF (or error) means the client released its socket.
                let mut rest = Vec::new();
                let _ = reader.read_to_end(&mut rest).await;
                shared.closed.fetch_add(1, Ordering::SeqCst);
            });
        }
    });

    backend
}

/// An address nothing listens on.
#[allow(dead_code)]
pub async fn unreachable_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Config pointing at `backend`, with short timeouts.
#[allow(dead_code)]
pub fn config_for(backend: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.backend.address = backend.to_string();
    config.timeouts.connect_secs = 1;
    config.timeouts.call_secs = 1;
    config.timeouts.request_secs = 5;
    config
}

/// A running gateway.
#[allow(dead_code)]
pub struct TestGateway {
    pub addr: SocketAddr,
    pub base_url: String,
    pub shutdown: Shutdown,
    pub config_tx: mpsc::UnboundedSender<GatewayConfig>,
}

/// Start the HTTP gateway on an ephemeral port.
#[allow(dead_code)]
pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let shutdown = Shutdown::new();
    let (config_tx, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::new(config);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    TestGateway {
        addr,
        base_url,
        shutdown,
        config_tx,
    }
}

#[allow(dead_code)]
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
