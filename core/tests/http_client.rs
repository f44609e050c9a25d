/*
 * http_client.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Integration tests for the raw-socket HTTP client against a local
 * scripted server: body framing, redirect chasing with the hop budget,
 * cookie replay across hops, secure-upgrade delegation, and cancellation.
 *
 * Run with:
 *   cargo test -p filodiretto_core --test http_client
 */

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use filodiretto_core::{
    DelegateFuture, HttpClient, HttpError, HttpUrl, Method, RequestTemplate, Response,
    ResponseHead, SecureDelegate,
};

/// Accept one connection per scripted response, capture each request head,
/// write the canned bytes, and close. Heads are reported in order.
async fn spawn_server(responses: Vec<Vec<u8>>) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        for response in responses {
            let (mut sock, _) = listener.accept().await.unwrap();
            let head = read_head(&mut sock).await;
            let _ = tx.send(head);
            sock.write_all(&response).await.unwrap();
            let _ = sock.shutdown().await;
        }
    });
    (addr, rx)
}

async fn read_head(sock: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match sock.read(&mut byte).await {
            Ok(0) | Err(_) => break,
            Ok(_) => head.push(byte[0]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

fn plain_url(addr: SocketAddr, path: &str) -> HttpUrl {
    HttpUrl::parse(&format!("http://{}{}", addr, path)).unwrap()
}

fn redirect_to(location: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 302 Found\r\nLocation: {}\r\nContent-Length: 0\r\n\r\n",
        location
    )
    .into_bytes()
}

fn ok_body(body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

#[tokio::test]
async fn get_with_fixed_length_body() {
    let (addr, mut heads) = spawn_server(vec![ok_body("hello")]).await;
    let client = HttpClient::new().without_delegate();
    let response = client
        .request(RequestTemplate::get(plain_url(addr, "/greet?who=me")))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text(), Some("hello"));
    let head = heads.recv().await.unwrap();
    assert!(head.starts_with("GET /greet?who=me HTTP/1.1\r\n"));
    assert!(head.contains(&format!("Host: {}\r\n", addr)));
}

#[tokio::test]
async fn chunked_response_assembles() {
    let (addr, _heads) = spawn_server(vec![
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
          5\r\nhello\r\n6\r\nworld!\r\n0\r\n\r\n"
            .to_vec(),
    ])
    .await;
    let client = HttpClient::new().without_delegate();
    let response = client
        .request(RequestTemplate::get(plain_url(addr, "/")))
        .await
        .unwrap();
    assert_eq!(response.text(), Some("helloworld!"));
}

#[tokio::test]
async fn eleven_hops_exceed_redirect_budget() {
    let responses: Vec<Vec<u8>> = (1..=11).map(|i| redirect_to(&format!("/hop{}", i))).collect();
    let (addr, _heads) = spawn_server(responses).await;
    let client = HttpClient::new().without_delegate();
    let err = client
        .request(RequestTemplate::get(plain_url(addr, "/start")))
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::RedirectLoopExceeded));
}

#[tokio::test]
async fn ten_hops_then_ok_succeeds() {
    let mut responses: Vec<Vec<u8>> =
        (1..=10).map(|i| redirect_to(&format!("/hop{}", i))).collect();
    responses.push(ok_body("made it"));
    let (addr, mut heads) = spawn_server(responses).await;
    let client = HttpClient::new().without_delegate();
    let response = client
        .request(RequestTemplate::get(plain_url(addr, "/start")))
        .await
        .unwrap();
    assert_eq!(response.text(), Some("made it"));
    // Each hop is a fresh connection replaying the original method.
    let mut seen = Vec::new();
    while let Ok(head) = heads.try_recv() {
        seen.push(head);
    }
    assert_eq!(seen.len(), 11);
    assert!(seen.last().unwrap().starts_with("GET /hop10 HTTP/1.1\r\n"));
}

#[tokio::test]
async fn redirect_replays_method_headers_and_body() {
    let (addr, mut heads) = spawn_server(vec![redirect_to("/resubmit"), ok_body("done")]).await;
    let client = HttpClient::new().without_delegate();
    let template = RequestTemplate::new(Method::Post, plain_url(addr, "/submit"))
        .header("X-Custom", "kept")
        .body(&b"payload"[..]);
    let response = client.request(template).await.unwrap();
    assert_eq!(response.text(), Some("done"));
    let first = heads.recv().await.unwrap();
    let second = heads.recv().await.unwrap();
    assert!(first.starts_with("POST /submit HTTP/1.1\r\n"));
    assert!(second.starts_with("POST /resubmit HTTP/1.1\r\n"));
    assert!(second.contains("X-Custom: kept\r\n"));
    assert!(second.contains("Content-Length: 7\r\n"));
}

#[tokio::test]
async fn cookies_set_on_one_hop_replay_on_the_next() {
    let set_cookie = b"HTTP/1.1 302 Found\r\nSet-Cookie: sid=abc\r\nLocation: /next\r\n\
                       Content-Length: 0\r\n\r\n"
        .to_vec();
    let (addr, mut heads) = spawn_server(vec![set_cookie, ok_body("in")]).await;
    let client = HttpClient::new().without_delegate();
    let response = client
        .request(RequestTemplate::get(plain_url(addr, "/login")))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let first = heads.recv().await.unwrap();
    let second = heads.recv().await.unwrap();
    assert!(!first.contains("Cookie:"));
    assert!(second.contains("Cookie: sid=abc\r\n"));
}

#[tokio::test]
async fn missing_content_length_is_reported() {
    let (addr, _heads) =
        spawn_server(vec![b"HTTP/1.1 200 OK\r\nServer: x\r\n\r\n".to_vec()]).await;
    let client = HttpClient::new().without_delegate();
    let err = client
        .request(RequestTemplate::get(plain_url(addr, "/")))
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::MissingContentLength));
}

#[tokio::test]
async fn malformed_status_line_is_reported() {
    let (addr, _heads) = spawn_server(vec![b"HTTP/1.1\r\n\r\n".to_vec()]).await;
    let client = HttpClient::new().without_delegate();
    let err = client
        .request(RequestTemplate::get(plain_url(addr, "/")))
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::MalformedResponse(_)));
}

/// Delegate that records the template it was handed and returns a canned
/// response.
struct RecordingDelegate {
    seen: Mutex<Option<RequestTemplate>>,
}

impl RecordingDelegate {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(None),
        })
    }
}

impl SecureDelegate for RecordingDelegate {
    fn perform(&self, template: RequestTemplate) -> DelegateFuture<'_> {
        *self.seen.lock().unwrap() = Some(template);
        Box::pin(async {
            let (head, _) =
                ResponseHead::parse(b"HTTP/1.1 200 OK\r\nX-From: delegate\r\n\r\n")?;
            Ok(Response::new(head, bytes_from("delegated")))
        })
    }
}

fn bytes_from(s: &str) -> bytes::Bytes {
    bytes::Bytes::copy_from_slice(s.as_bytes())
}

#[tokio::test]
async fn secure_upgrade_hands_original_request_to_delegate() {
    let (addr, _heads) =
        spawn_server(vec![redirect_to("https://secure.example/landing")]).await;
    let delegate = RecordingDelegate::new();
    let client = HttpClient::new().with_delegate(delegate.clone());
    let template = RequestTemplate::new(Method::Post, plain_url(addr, "/start"))
        .header("X-Custom", "kept")
        .body(&b"payload"[..]);
    let response = client.request(template).await.unwrap();

    // The delegate's result is the operation's result, unmodified.
    assert_eq!(response.text(), Some("delegated"));
    assert_eq!(response.header("X-From"), Some("delegate"));

    let seen = delegate.seen.lock().unwrap().clone().unwrap();
    assert_eq!(seen.method, Method::Post);
    assert_eq!(seen.url, HttpUrl::parse("https://secure.example/landing").unwrap());
    assert_eq!(seen.headers, vec![("X-Custom".to_string(), "kept".to_string())]);
    assert_eq!(seen.body.as_deref(), Some(&b"payload"[..]));
}

#[tokio::test]
async fn secure_initial_request_bypasses_raw_path() {
    let delegate = RecordingDelegate::new();
    let client = HttpClient::new().with_delegate(delegate.clone());
    let response = client.get("https://secure.example/direct").await.unwrap();
    assert_eq!(response.text(), Some("delegated"));
    let seen = delegate.seen.lock().unwrap().clone().unwrap();
    assert_eq!(seen.url.path, "/direct");
}

#[tokio::test]
async fn upgrade_without_delegate_is_an_error() {
    let (addr, _heads) =
        spawn_server(vec![redirect_to("https://secure.example/landing")]).await;
    let client = HttpClient::new().without_delegate();
    let err = client
        .request(RequestTemplate::get(plain_url(addr, "/start")))
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::UpstreamDelegate(_)));
}

#[tokio::test]
async fn cancel_before_response_closes_transport() {
    // Server that accepts, reads the request head, then holds the
    // connection open until the client goes away.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let _ = read_head(&mut sock).await;
        // No response; wait for the peer to close.
        let mut buf = [0u8; 64];
        loop {
            match sock.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
        let _ = closed_tx.send(());
    });

    let client = HttpClient::new().without_delegate();
    let task = client.submit(RequestTemplate::get(plain_url(addr, "/slow")));
    // Let the request head reach the server, then cancel mid-flight.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    task.cancel();
    let err = task.result().await.unwrap_err();
    assert!(matches!(err, HttpError::Cancelled));
    // The transport must be torn down, not leaked.
    closed_rx.recv().await.unwrap();
}

#[tokio::test]
async fn cancel_before_connect_finalizes_immediately() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = HttpClient::new().without_delegate();
    let task = client.submit(RequestTemplate::get(plain_url(addr, "/")));
    task.cancel();
    let err = task.result().await.unwrap_err();
    assert!(matches!(
        err,
        HttpError::Cancelled | HttpError::ConnectFailure(_)
    ));
}

#[tokio::test]
async fn pool_of_one_still_completes_queued_operations() {
    let (addr, _heads) = spawn_server(vec![ok_body("one"), ok_body("two")]).await;
    let client = HttpClient::new().without_delegate().with_max_concurrent(1);
    let first = client.submit(RequestTemplate::get(plain_url(addr, "/a")));
    let second = client.submit(RequestTemplate::get(plain_url(addr, "/b")));
    let first = first.result().await.unwrap();
    let second = second.result().await.unwrap();
    let mut bodies = vec![
        first.text().unwrap().to_string(),
        second.text().unwrap().to_string(),
    ];
    bodies.sort();
    assert_eq!(bodies, vec!["one".to_string(), "two".to_string()]);
}

#[tokio::test]
async fn connect_refused_is_connect_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = HttpClient::new().without_delegate();
    let err = client
        .request(RequestTemplate::get(plain_url(addr, "/")))
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::ConnectFailure(_)));
}

#[tokio::test]
async fn bad_url_is_rejected_up_front() {
    let client = HttpClient::new().without_delegate();
    let err = client.get("not a url").await.unwrap_err();
    assert!(matches!(err, HttpError::BadUrl(_)));
}
