//! Common test utilities for integration tests

use faultline::config::Config;
use faultline::FaultServer;
use reqwest::Client;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A configuration with the default seed endpoints, bound to localhost on
/// the given port, with the static root inside the test directory.
#[allow(dead_code)]
pub fn base_config(port: u16, static_dir: &str) -> Config {
    let mut config = Config::default_config();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = port;
    config.server.static_dir = static_dir.to_string();
    config
}

/// Start a server against a fresh temp directory, applying `mutate` to the
/// seed configuration first.
#[allow(dead_code)]
pub async fn start_test_server_with<F>(mutate: F) -> TestServer
where
    F: FnOnce(&mut Config),
{
    let dir = TempDir::new().expect("Failed to create temp dir");
    let port = find_free_port().await;
    let static_dir = dir.path().join("static");

    let mut config = base_config(port, static_dir.to_str().unwrap());
    mutate(&mut config);

    let config_path = dir.path().join("config.json");
    std::fs::write(
        &config_path,
        serde_json::to_string_pretty(&config).unwrap(),
    )
    .expect("Failed to write test config");

    let addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
    let server = Arc::new(FaultServer::new(config_path.clone()));

    let running = server.clone();
    let handle = tokio::spawn(async move {
        running.run().await.expect("Server failed");
    });

    wait_until_ready(addr).await;

    TestServer {
        addr,
        config_path,
        server,
        _dir: dir,
        handle,
    }
}

/// Start a server with the unmodified seed configuration.
#[allow(dead_code)]
pub async fn start_test_server() -> TestServer {
    start_test_server_with(|_| {}).await
}

async fn wait_until_ready(addr: SocketAddr) {
    let client = test_client();
    for _ in 0..40 {
        if let Ok(response) = client.get(format!("http://{}/stats", addr)).send().await {
            if response.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("server did not become ready on {}", addr);
}

/// Find a free port for testing
pub async fn find_free_port() -> u16 {
    use tokio::net::TcpListener;
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind to port");
    let port = listener.local_addr().expect("Failed to get local addr").port();
    drop(listener);
    port
}

/// Test server handle
pub struct TestServer {
    pub addr: SocketAddr,
    pub config_path: PathBuf,
    pub server: Arc<FaultServer>,
    _dir: TempDir,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    #[allow(dead_code)]
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Re-read the config file the server persists to.
    #[allow(dead_code)]
    pub fn config_on_disk(&self) -> Config {
        let raw = std::fs::read_to_string(&self.config_path).expect("Failed to read config file");
        serde_json::from_str(&raw).expect("Config file is not valid JSON")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.stop();
        self.handle.abort();
    }
}

/// Create a test HTTP client
pub fn test_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("Failed to create client")
}
