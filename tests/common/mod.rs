//! Shared utilities for the integration tests: a proxy on an ephemeral port
//! and the origins it talks to.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::Form;
use axum::http::{header, HeaderValue, Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use forward_proxy::config::ProxyConfig;
use forward_proxy::net::Listener;
use forward_proxy::{ProxyServer, Shutdown};

/// Connect timeout used by [`test_config`].
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(1_000);

/// Request timeout used by [`test_config`]. Shorter than the `/wait` route.
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(1_000);

/// A running proxy. Stops accepting when dropped.
pub struct TestProxy {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn test_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.listener.max_connections = 64;
    config.timeouts.connect_ms = CONNECT_TIMEOUT.as_millis() as u64;
    config.timeouts.request_ms = REQUEST_TIMEOUT.as_millis() as u64;
    config
}

/// Start the proxy on an ephemeral loopback port.
pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = ProxyServer::new(&config);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestProxy { addr, shutdown }
}

/// The origin web server:
/// - `GET /ws` echoes WebSocket messages
/// - `GET /notfound` answers 404
/// - `GET /wait` answers after two seconds
/// - `GET <any>` answers `GET <uri>`
/// - `PUT <any>` answers `PUT <uri>: <body>`
/// - `POST /form` answers `POST /form: <form as JSON>`
/// - any other method answers 501
pub async fn start_origin() -> SocketAddr {
    let app = Router::new()
        .route("/ws", get(websocket_echo))
        .route("/form", post(form_echo))
        .fallback(origin_fallback);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn websocket_echo(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(echo_messages)
}

async fn echo_messages(mut socket: WebSocket) {
    while let Some(Ok(message)) = socket.recv().await {
        if socket.send(message).await.is_err() {
            break;
        }
    }
}

async fn form_echo(Form(pairs): Form<Vec<(String, String)>>) -> String {
    let mut form: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in pairs {
        form.entry(key).or_default().push(value);
    }
    format!("POST /form: {}", serde_json::to_string(&form).unwrap())
}

async fn origin_fallback(method: Method, uri: Uri, body: String) -> Response {
    match method {
        Method::GET => match uri.path() {
            "/notfound" => StatusCode::NOT_FOUND.into_response(),
            "/wait" => {
                tokio::time::sleep(Duration::from_secs(2)).await;
                StatusCode::OK.into_response()
            }
            _ => format!("GET {}", uri).into_response(),
        },
        Method::PUT => format!("PUT {}: {}", uri, body).into_response(),
        _ => StatusCode::NOT_IMPLEMENTED.into_response(),
    }
}

/// Accepts connections and never answers.
pub async fn start_silent_origin() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Accepts connections and closes them immediately.
pub async fn start_closing_origin() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });
    addr
}

/// Reads the request, sends only a status line, then closes.
pub async fn start_half_response_origin() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(b"HTTP/1.1 200 Ok\r\n").await;
                let _ = socket.flush().await;
            });
        }
    });
    addr
}

/// Response head sent by [`start_upgrading_origin`].
pub const UPGRADING_ORIGIN_HEAD: &str = "HTTP/1.1 101 Switching Protocols\r\n\
    Connection: Upgrade\r\n\
    Upgrade: websocket\r\n\
    X-Odd: 1\r\n\
    \r\n";

/// Bytes the upgrading origin sends in the same write as its head.
pub const UPGRADING_ORIGIN_EARLY: &[u8; 5] = b"EARLY";

/// Reads a request head, answers with [`UPGRADING_ORIGIN_HEAD`] immediately
/// followed by [`UPGRADING_ORIGIN_EARLY`], then waits for the peer to close.
pub async fn start_upgrading_origin() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let head = read_head(&mut socket).await;
                if head.is_empty() {
                    return;
                }
                let mut answer = UPGRADING_ORIGIN_HEAD.as_bytes().to_vec();
                answer.extend_from_slice(UPGRADING_ORIGIN_EARLY);
                let _ = socket.write_all(&answer).await;
                let mut rest = Vec::new();
                let _ = socket.read_to_end(&mut rest).await;
            });
        }
    });
    addr
}

/// Echoes every byte back on each connection.
pub async fn start_tcp_echo() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut rd, mut wr) = socket.into_split();
                let _ = tokio::io::copy(&mut rd, &mut wr).await;
            });
        }
    });
    addr
}

/// A reqwest client that uses the proxy for plain HTTP.
pub fn explicit_client(proxy: &TestProxy) -> reqwest::Client {
    reqwest::Client::builder()
        .proxy(reqwest::Proxy::http(proxy.url()).unwrap())
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Send a request the way an intercepted client would: origin-form target,
/// `Host` naming the origin, TCP connection to the proxy.
pub async fn transparent_request(
    proxy: &TestProxy,
    origin: SocketAddr,
    method: &str,
    path: &str,
    content_type: Option<&str>,
    body: &str,
) -> (StatusCode, String) {
    let stream = TcpStream::connect(proxy.addr).await.unwrap();
    let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .unwrap();
    tokio::spawn(connection);

    let mut request = Request::builder()
        .method(Method::from_bytes(method.as_bytes()).unwrap())
        .uri(path)
        .header(header::HOST, origin.to_string())
        .body(Body::from(body.to_string()))
        .unwrap();
    if let Some(content_type) = content_type {
        request
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
    }

    let response = sender.send_request(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(Body::new(response.into_body()), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

/// Read an HTTP response head byte by byte, leaving the stream positioned
/// right after the blank line.
pub async fn read_head(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        let n = stream.read(&mut byte).await.unwrap();
        if n == 0 {
            break;
        }
        head.push(byte[0]);
    }
    String::from_utf8_lossy(&head).into_owned()
}

/// Open a CONNECT tunnel through the proxy and return the stream together
/// with the response head.
pub async fn connect_tunnel(proxy: &TestProxy, target: &str) -> (TcpStream, String) {
    let mut stream = TcpStream::connect(proxy.addr).await.unwrap();
    let request = format!("CONNECT {target} HTTP/1.1\r\nHost: {target}\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let head = read_head(&mut stream).await;
    (stream, head)
}
