//! Reverse proxy to the build daemon's control socket
//!
//! Each request gets its own HTTP/1 connection over the Unix socket. Bodies
//! stream in both directions; `101 Switching Protocols` responses turn into a
//! raw bidirectional tunnel, which is how build sessions hijack the
//! connection.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use hyper::body::Incoming;
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;
use tracing::{debug, warn};

use super::state::AppState;
use super::types::ApiError;
use crate::domain::DomainError;
use crate::lifecycle::ActivityGuard;

/// Headers that describe a single hop and must not be forwarded
const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Host presented to the daemon
const DAEMON_HOST: &str = "localhost";

/// Forwards requests to the daemon listening on a Unix socket
#[derive(Debug, Clone)]
pub struct DaemonProxy {
    socket_path: PathBuf,
}

impl DaemonProxy {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Proxies one request. Transport failures become `502 Bad Gateway`;
    /// daemon responses, including daemon errors, pass through untouched.
    pub async fn forward(&self, mut request: Request) -> Response {
        let upgrade = upgrade_protocol(request.headers());
        let client_upgrade = upgrade.is_some().then(|| hyper::upgrade::on(&mut request));
        let lease = request.extensions().get::<ActivityGuard>().cloned();
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let (mut parts, body) = request.into_parts();
        parts.uri = origin_form(&parts.uri);
        strip_hop_by_hop(&mut parts.headers);
        // Directory credentials are for the gateway only.
        parts.headers.remove(header::AUTHORIZATION);
        parts
            .headers
            .insert(header::HOST, HeaderValue::from_static(DAEMON_HOST));
        if let Some(protocol) = upgrade {
            parts
                .headers
                .insert(header::CONNECTION, HeaderValue::from_static("Upgrade"));
            parts.headers.insert(header::UPGRADE, protocol);
        }
        if let Some(ip) = peer {
            append_forwarded_for(&mut parts.headers, ip);
        }

        debug!(method = %parts.method, uri = %parts.uri, "Forwarding to daemon");

        let mut response = match self.send(Request::from_parts(parts, body)).await {
            Ok(response) => response,
            Err(e) => {
                warn!(socket = %self.socket_path.display(), error = %e, "Proxy error");
                return ApiError::from(e).into_response();
            }
        };

        if response.status() == StatusCode::SWITCHING_PROTOCOLS {
            if let Some(client_upgrade) = client_upgrade {
                let daemon_upgrade = hyper::upgrade::on(&mut response);
                tokio::spawn(tunnel(client_upgrade, daemon_upgrade, lease));
            }
            return response.map(Body::new);
        }

        strip_hop_by_hop(response.headers_mut());
        response.map(Body::new)
    }

    async fn send(&self, request: Request) -> Result<Response<Incoming>, DomainError> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            DomainError::proxy(format!("dial {}: {}", self.socket_path.display(), e))
        })?;

        let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| DomainError::proxy(format!("handshake failed: {}", e)))?;

        tokio::spawn(async move {
            if let Err(e) = connection.with_upgrades().await {
                debug!(error = %e, "Daemon connection closed with error");
            }
        });

        sender
            .send_request(request)
            .await
            .map_err(|e| DomainError::proxy(format!("request failed: {}", e)))
    }
}

/// Fallback handler: every path and method goes to the daemon
pub async fn proxy_request(State(state): State<AppState>, request: Request) -> Response {
    state.proxy.forward(request).await
}

/// Copies bytes both ways until either side closes. Holds the request's
/// activity lease so the tunnel counts as in flight.
async fn tunnel(client: OnUpgrade, daemon: OnUpgrade, _lease: Option<ActivityGuard>) {
    let (client, daemon) = match tokio::try_join!(client, daemon) {
        Ok(pair) => pair,
        Err(e) => {
            warn!(error = %e, "Upgrade failed");
            return;
        }
    };

    let mut client = TokioIo::new(client);
    let mut daemon = TokioIo::new(daemon);

    match tokio::io::copy_bidirectional(&mut client, &mut daemon).await {
        Ok((to_daemon, to_client)) => {
            debug!(to_daemon, to_client, "Upgraded connection closed")
        }
        Err(e) => debug!(error = %e, "Upgraded connection closed with error"),
    }
}

fn upgrade_protocol(headers: &HeaderMap) -> Option<HeaderValue> {
    let wants_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    if wants_upgrade {
        headers.get(header::UPGRADE).cloned()
    } else {
        None
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named in Connection are hop-by-hop too.
    let named: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();

    for name in named.iter().map(String::as_str).chain(HOP_BY_HOP_HEADERS) {
        headers.remove(name);
    }
}

fn origin_form(uri: &Uri) -> Uri {
    uri.path_and_query()
        .cloned()
        .map(Uri::from)
        .unwrap_or_else(|| Uri::from_static("/"))
}

fn append_forwarded_for(headers: &mut HeaderMap, ip: IpAddr) {
    let value = match headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        Some(prior) => format!("{}, {}", prior, ip),
        None => ip.to_string(),
    };

    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert("x-forwarded-for", value);
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::api::testing::spawn_mock_daemon;
    use axum::body::to_bytes;
    use axum::routing::{any, get};
    use axum::Router;

    #[test]
    fn test_origin_form_keeps_path_and_query() {
        let uri: Uri = "http://builder.internal:8080/v1.43/build?t=app%3Alatest"
            .parse()
            .unwrap();

        assert_eq!(origin_form(&uri).to_string(), "/v1.43/build?t=app%3Alatest");
    }

    #[test]
    fn test_strip_hop_by_hop_includes_connection_tokens() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, "keep-alive, x-trace".parse().unwrap());
        headers.insert("keep-alive", "timeout=5".parse().unwrap());
        headers.insert("x-trace", "abc".parse().unwrap());
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());

        strip_hop_by_hop(&mut headers);

        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get("keep-alive").is_none());
        assert!(headers.get("x-trace").is_none());
        assert!(headers.get(header::CONTENT_TYPE).is_some());
    }

    #[test]
    fn test_upgrade_protocol_detection() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, "Upgrade".parse().unwrap());
        headers.insert(header::UPGRADE, "tcp".parse().unwrap());
        assert_eq!(upgrade_protocol(&headers).unwrap(), "tcp");

        let mut headers = HeaderMap::new();
        headers.insert(header::UPGRADE, "tcp".parse().unwrap());
        assert!(upgrade_protocol(&headers).is_none());
    }

    #[test]
    fn test_append_forwarded_for() {
        let mut headers = HeaderMap::new();
        append_forwarded_for(&mut headers, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(headers.get("x-forwarded-for").unwrap(), "10.0.0.1");

        append_forwarded_for(&mut headers, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(headers.get("x-forwarded-for").unwrap(), "10.0.0.1, 10.0.0.2");
    }

    #[tokio::test]
    async fn test_forward_rewrites_target() {
        let daemon = spawn_mock_daemon(Router::new().route(
            "/{*path}",
            any(|request: Request| async move {
                let host = request
                    .headers()
                    .get(header::HOST)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let authorization = request.headers().contains_key(header::AUTHORIZATION);
                format!("{} {} {}", request.uri(), host, authorization)
            }),
        ))
        .await;

        let proxy = DaemonProxy::new(daemon.socket_path());
        let request = Request::builder()
            .uri("http://gateway.example:8080/_ping?x=1")
            .header(header::AUTHORIZATION, "Basic d2ViOnRva2Vu")
            .body(Body::empty())
            .unwrap();

        let response = proxy.forward(request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), b"/_ping?x=1 localhost false");
    }

    #[tokio::test]
    async fn test_daemon_errors_pass_through() {
        let daemon = spawn_mock_daemon(Router::new().route(
            "/images/missing/json",
            get(|| async { (StatusCode::NOT_FOUND, r#"{"message":"No such image"}"#) }),
        ))
        .await;

        let proxy = DaemonProxy::new(daemon.socket_path());
        let request = Request::builder()
            .uri("/images/missing/json")
            .body(Body::empty())
            .unwrap();

        let response = proxy.forward(request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unreachable_socket_is_bad_gateway() {
        let proxy = DaemonProxy::new("/nonexistent/build-gateway/docker.sock");
        let request = Request::builder().uri("/_ping").body(Body::empty()).unwrap();

        let response = proxy.forward(request).await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
