//! Outbound failures: every one becomes a 502, and its class matches the cause.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use forward_proxy::http::Forwarder;
use forward_proxy::net::{classify, Dialer, ErrorClass};
use tokio::io::AsyncReadExt;

mod common;

async fn explicit_get(url: String) -> (u16, String) {
    let proxy = common::start_proxy(common::test_config()).await;
    let client = common::explicit_client(&proxy);

    let res = client.get(url).send().await.expect("Proxy unreachable");
    let status = res.status().as_u16();
    (status, res.text().await.unwrap())
}

fn forwarder() -> Forwarder {
    Forwarder::new(Dialer::new(Duration::from_millis(500)), Duration::from_millis(500))
}

fn get(url: String) -> Request<Body> {
    Request::get(url).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_connection_refused() {
    // Nothing listens on port 1.
    let (status, body) = explicit_get("http://127.0.0.1:1/".into()).await;

    assert_eq!(status, 502);
    assert!(body.starts_with("Request error: "), "body: {body}");
}

#[tokio::test]
async fn test_origin_never_answers() {
    let origin = common::start_silent_origin().await;
    let (status, body) = explicit_get(format!("http://{}/", origin)).await;

    assert_eq!(status, 502);
    assert!(body.contains("timed out"), "body: {body}");
}

#[tokio::test]
async fn test_origin_answers_too_late() {
    let origin = common::start_origin().await;
    let (status, body) = explicit_get(format!("http://{}/wait", origin)).await;

    assert_eq!(status, 502);
    assert!(body.contains("timed out"), "body: {body}");
}

#[tokio::test]
async fn test_origin_closes_without_answer() {
    let origin = common::start_closing_origin().await;
    let (status, body) = explicit_get(format!("http://{}/", origin)).await;

    assert_eq!(status, 502);
    assert!(!body.contains("timed out"), "body: {body}");
}

#[tokio::test]
async fn test_origin_closes_mid_response() {
    let origin = common::start_half_response_origin().await;
    let (status, body) = explicit_get(format!("http://{}/close", origin)).await;

    assert_eq!(status, 502);
    assert!(!body.contains("timed out"), "body: {body}");
}

#[tokio::test]
async fn test_transparent_request_without_host() {
    let proxy = common::start_proxy(common::test_config()).await;

    let mut stream = tokio::net::TcpStream::connect(proxy.addr).await.unwrap();
    tokio::io::AsyncWriteExt::write_all(&mut stream, b"GET /get HTTP/1.0\r\n\r\n")
        .await
        .unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    let response = String::from_utf8_lossy(&response);

    assert!(response.starts_with("HTTP/1."), "response: {response}");
    assert!(response.contains(" 502 "), "response: {response}");
    assert!(response.contains("New request error: "), "response: {response}");
}

#[tokio::test]
async fn test_failure_classes() {
    let forwarder = forwarder();

    let err = forwarder.forward(get("http://127.0.0.1:1/".into())).await.unwrap_err();
    assert_eq!(classify(&err), ErrorClass::Network);

    let silent = common::start_silent_origin().await;
    let err = forwarder.forward(get(format!("http://{}/", silent))).await.unwrap_err();
    assert_eq!(classify(&err), ErrorClass::Timeout);

    let closing = common::start_closing_origin().await;
    let err = forwarder.forward(get(format!("http://{}/", closing))).await.unwrap_err();
    assert_eq!(classify(&err), ErrorClass::Network);

    let err = forwarder
        .forward(get("http://no-such-host.invalid/".into()))
        .await
        .unwrap_err();
    assert!(
        matches!(classify(&err), ErrorClass::Dns | ErrorClass::Timeout),
        "class: {}",
        classify(&err)
    );
}

#[tokio::test]
async fn test_connect_dial_failure() {
    let proxy = common::start_proxy(common::test_config()).await;

    let (mut stream, head) = common::connect_tunnel(&proxy, "127.0.0.1:1").await;
    assert!(head.starts_with("HTTP/1.1 502"), "head: {head}");

    let length: usize = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse().ok())?
        })
        .unwrap();
    let mut body = vec![0u8; length];
    stream.read_exact(&mut body).await.unwrap();
    assert!(String::from_utf8_lossy(&body).starts_with("Connect error: "));
}

#[tokio::test]
async fn test_status_is_bad_gateway_for_every_class() {
    let proxy = common::start_proxy(common::test_config()).await;
    let client = common::explicit_client(&proxy);
    let silent = common::start_silent_origin().await;
    let closing = common::start_closing_origin().await;

    for url in [
        "http://127.0.0.1:1/".to_string(),
        format!("http://{}/", silent),
        format!("http://{}/", closing),
    ] {
        let res = client.get(&url).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY.as_u16(), "url: {url}");
        assert_eq!(res.headers()["content-type"], "text/plain");
    }
}
