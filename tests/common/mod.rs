//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::header::{HOST, REFERER};
use axum::http::{HeaderMap, HeaderName, Method, Uri};
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use rewrite_proxy::config::ProxyConfig;
use rewrite_proxy::http::HttpServer;
use rewrite_proxy::lifecycle::Shutdown;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

/// Start the proxy on an ephemeral port. Keep the returned `Shutdown` alive
/// for the duration of the test.
pub async fn spawn_proxy(config: ProxyConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });
    (addr, shutdown)
}

/// Config with a single route `prefix → target`.
pub fn config_with_route(prefix: &str, target: &str) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.routes.insert(prefix.into(), target.into());
    config
}

/// Origin that describes the request it received:
///
/// ```text
/// METHOD /path?query
/// host: ...
/// referer: ...
///
/// body
/// ```
pub async fn spawn_echo_origin() -> SocketAddr {
    async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> String {
        let header = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string()
        };
        format!(
            "{method} {uri}\nhost: {}\nreferer: {}\n\n{}",
            header(HOST),
            header(REFERER),
            String::from_utf8_lossy(&body)
        )
    }

    let app = Router::new().fallback(echo);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start a mock backend that answers every connection with a fixed raw
/// HTTP response. `make` receives the backend's own address.
pub async fn start_mock_backend(make: impl FnOnce(SocketAddr) -> String) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let response: &'static str = Box::leak(make(addr).into_boxed_str());

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Raw HTTP/1.1 response with the given content type and extra header lines.
pub fn raw_response(status: &str, content_type: &str, extra_headers: &[String], body: &str) -> String {
    let mut response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n",
        body.len()
    );
    for line in extra_headers {
        response.push_str(line);
        response.push_str("\r\n");
    }
    response.push_str("\r\n");
    response.push_str(body);
    response
}

/// What a WebSocket test origin observed.
#[derive(Debug, PartialEq)]
pub enum WsEvent {
    /// Request path and query of an accepted handshake.
    Handshake(String),
    /// The connection ended.
    Closed,
}

/// WebSocket config with no frame or message size limits.
pub fn unlimited_ws_config() -> WebSocketConfig {
    WebSocketConfig::default()
        .max_message_size(None)
        .max_frame_size(None)
}

/// WebSocket origin echoing text and binary frames, without size limits.
/// Handshakes and connection ends are reported on the returned channel.
pub async fn spawn_ws_echo() -> (SocketAddr, mpsc::UnboundedReceiver<WsEvent>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let handshake = tokio_tungstenite::accept_hdr_async_with_config(
                    stream,
                    |request: &Request, response: Response| {
                        let _ = tx.send(WsEvent::Handshake(request.uri().to_string()));
                        Ok(response)
                    },
                    Some(unlimited_ws_config()),
                );
                let Ok(mut ws) = handshake.await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    if message.is_text() || message.is_binary() {
                        if ws.send(message).await.is_err() {
                            break;
                        }
                    } else if message.is_close() {
                        break;
                    }
                }
                let _ = tx.send(WsEvent::Closed);
            });
        }
    });
    (addr, rx)
}

/// WebSocket origin that sends a Close frame right after the handshake and
/// drops the connection.
pub async fn spawn_ws_closer() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                if let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await {
                    let _ = ws.close(None).await;
                }
            });
        }
    });
    addr
}

/// Origin that answers every request after `delay`.
pub async fn spawn_slow_origin(delay: Duration) -> SocketAddr {
    let app = Router::new().fallback(move || async move {
        tokio::time::sleep(delay).await;
        "late"
    });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Client that never follows redirects and bypasses system proxies.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}
