//! In-process HTTP server answering JSON requests for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use aura_wallet_lib::{Environment, Settings, WalletContext};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
pub struct MockRequest {
    /// Header names are lowercased
    pub headers: HashMap<String, String>,
    pub body: Value,
}

impl MockRequest {
    pub fn method(&self) -> &str {
        self.body["method"].as_str().unwrap_or_default()
    }

    pub fn params(&self) -> &Value {
        &self.body["params"]
    }
}

pub struct MockResponse {
    pub status: u16,
    pub body: Value,
}

impl MockResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn status(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn rpc_result(request: &MockRequest, result: Value) -> Self {
        Self::ok(json!({ "jsonrpc": "2.0", "id": request.body["id"], "result": result }))
    }

    pub fn rpc_error(request: &MockRequest, code: i64, message: &str) -> Self {
        Self::ok(json!({
            "jsonrpc": "2.0",
            "id": request.body["id"],
            "error": { "code": code, "message": message },
        }))
    }
}

/// `{"context": {...}, "value": value}` as nodes wrap most results
pub fn contextual(value: Value) -> Value {
    json!({ "context": { "slot": 1 }, "value": value })
}

type Handler = dyn Fn(&MockRequest) -> MockResponse + Send + Sync;

pub struct MockServer {
    pub url: String,
    requests: Arc<Mutex<Vec<MockRequest>>>,
}

impl MockServer {
    pub async fn start<F>(handler: F) -> MockServer
    where
        F: Fn(&MockRequest) -> MockResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handler: Arc<Handler> = Arc::new(handler);
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let handler = handler.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, handler, recorded).await;
                });
            }
        });

        MockServer {
            url: format!("http://{}", addr),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<MockRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// JSON-RPC methods received, in order
    pub fn methods(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| r.method().to_string())
            .collect()
    }
}

/// An address nothing listens on
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn serve(
    mut stream: TcpStream,
    handler: Arc<Handler>,
    recorded: Arc<Mutex<Vec<MockRequest>>>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let headers: HashMap<String, String> = head
        .lines()
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
        .collect();
    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body_end = (header_end + content_length).min(buf.len());
    let body = serde_json::from_slice(&buf[header_end..body_end]).unwrap_or(Value::Null);

    let request = MockRequest { headers, body };
    let response = handler(&request);
    recorded.lock().unwrap().push(request);

    let payload = response.body.to_string();
    let reply = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        if response.status < 400 { "OK" } else { "Error" },
        payload.len(),
        payload
    );
    stream.write_all(reply.as_bytes()).await?;
    stream.shutdown().await
}

pub fn test_context(dir: &TempDir) -> WalletContext {
    let settings = Settings {
        environment: Environment::Test,
        ..Settings::default()
    };
    WalletContext::initialize_with(dir.path().join("aura"), settings).unwrap()
}
