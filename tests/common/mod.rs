#![allow(dead_code)]

use std::io::ErrorKind;
use std::net::{Ipv4Addr, TcpListener};

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use omniplexer::gateway::config::ServerSection;
use omniplexer::gateway::http::{GatewayHttpState, router};
use omniplexer::{Omniplexer, ServerRegistry};
use tower::util::ServiceExt;

/// Mock upstreams listen on loopback. Returns `true` (and says why) when the
/// sandbox refuses that, so the caller can bail out early.
pub fn mock_upstreams_unavailable() -> bool {
    match TcpListener::bind((Ipv4Addr::LOCALHOST, 0)) {
        Ok(_) => false,
        Err(err) if err.kind() == ErrorKind::PermissionDenied => {
            eprintln!("loopback bind refused ({err}); mock upstream test not run");
            true
        }
        Err(err) => panic!("unexpected loopback bind failure: {err}"),
    }
}

pub fn registry(sections: Vec<(&str, ServerSection)>) -> ServerRegistry {
    ServerRegistry::load(
        sections
            .into_iter()
            .map(|(name, section)| (name.to_string(), section)),
    )
    .expect("registry")
}

pub fn app(omniplexer: Omniplexer) -> (Router, GatewayHttpState) {
    let state = GatewayHttpState::new(omniplexer);
    (router(state.clone()), state)
}

pub struct Reply {
    pub status: StatusCode,
    pub content_type: String,
    pub raw: Vec<u8>,
    pub body: String,
}

pub async fn send(app: &Router, method: &str, uri: &str) -> Reply {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let raw = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body")
        .to_vec();
    Reply {
        status,
        content_type,
        body: String::from_utf8_lossy(&raw).into_owned(),
        raw,
    }
}

pub async fn get(app: &Router, uri: &str) -> Reply {
    send(app, "GET", uri).await
}
