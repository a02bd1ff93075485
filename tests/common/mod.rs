//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tunnel_proxy::config::ProxyConfig;
use tunnel_proxy::http::HttpServer;
use tunnel_proxy::lifecycle::Shutdown;
use tunnel_proxy::register::BackendRegister;

/// What a mock backend saw.
#[derive(Debug, Clone, Default)]
pub struct Captured {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// How a mock backend answers one request.
#[derive(Debug, Clone)]
pub enum Behavior {
    Respond {
        status: u16,
        headers: Vec<(&'static str, String)>,
        body: String,
    },
    /// Chunked transfer encoding, one write per chunk.
    Chunked(Vec<String>),
    /// Close the connection without answering.
    Drop,
    /// Accept the request and never answer.
    Hang,
}

impl Behavior {
    pub fn ok(body: &str) -> Self {
        Behavior::Respond { status: 200, headers: Vec::new(), body: body.to_string() }
    }
}

pub struct MockBackend {
    pub addr: SocketAddr,
    calls: Arc<AtomicUsize>,
    captured: Arc<Mutex<Vec<Captured>>>,
}

impl MockBackend {
    /// Start a backend whose answer depends on the call index (0-based) and the request.
    pub async fn start<F>(behave: F) -> Self
    where
        F: Fn(usize, &Captured) -> Behavior + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let captured = Arc::new(Mutex::new(Vec::new()));
        let behave = Arc::new(behave);

        let (c, cap) = (calls.clone(), captured.clone());
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let (c, cap, behave) = (c.clone(), cap.clone(), behave.clone());
                tokio::spawn(async move {
                    serve_one(socket, c, cap, behave).await;
                });
            }
        });

        Self { addr, calls, captured }
    }

    pub async fn fixed(body: &'static str) -> Self {
        Self::start(move |_, _| Behavior::ok(body)).await
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<Captured> {
        self.captured.lock().unwrap().last().cloned()
    }
}

async fn serve_one<F>(
    mut socket: TcpStream,
    calls: Arc<AtomicUsize>,
    captured: Arc<Mutex<Vec<Captured>>>,
    behave: Arc<F>,
) where
    F: Fn(usize, &Captured) -> Behavior + Send + Sync + 'static,
{
    let Some(request) = read_request(&mut socket).await else {
        return;
    };
    let index = calls.fetch_add(1, Ordering::SeqCst);
    captured.lock().unwrap().push(request.clone());

    match behave(index, &request) {
        Behavior::Respond { status, headers, body } => {
            let mut head = format!("HTTP/1.1 {} {}\r\n", status, reason(status));
            for (k, v) in headers {
                head.push_str(&format!("{}: {}\r\n", k, v));
            }
            head.push_str(&format!("Content-Length: {}\r\nConnection: close\r\n\r\n", body.len()));
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(body.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
        Behavior::Chunked(chunks) => {
            let head = "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
            let _ = socket.write_all(head.as_bytes()).await;
            for chunk in chunks {
                let frame = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
                let _ = socket.write_all(frame.as_bytes()).await;
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
            let _ = socket.shutdown().await;
        }
        Behavior::Drop => drop(socket),
        Behavior::Hang => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            drop(socket);
        }
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        302 => "Found",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<Captured> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(Captured { method, target, headers, body })
}

/// A running proxy on a loopback port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub register: Arc<BackendRegister>,
    shutdown: Shutdown,
}

impl TestProxy {
    pub async fn start(config: ProxyConfig) -> Self {
        Self::with_register(config, Arc::new(BackendRegister::in_memory())).await
    }

    pub async fn with_register(config: ProxyConfig, register: Arc<BackendRegister>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = HttpServer::new(config, register.clone()).unwrap();
        let shutdown = Shutdown::new();
        let signal = shutdown.signalled();

        tokio::spawn(async move {
            let _ = server.run(listener, signal).await;
        });

        Self { addr, register, shutdown }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Defaults tightened so failure tests finish quickly.
pub fn fast_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.retries.delay_ms = 10;
    config.retries.max_delay_ms = 10;
    config.timeouts.connect_ms = 500;
    config.timeouts.response_ms = 2_000;
    config.timeouts.idle_ms = 2_000;
    config
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}
