use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use bytes::Bytes;
use tracing::Instrument as _;

use super::metrics_prometheus::EXPOSITION_CONTENT_TYPE;
use super::{GatewayReply, INTERNAL_ERROR_BODY, Omniplexer};

#[derive(Clone)]
pub struct GatewayHttpState {
    omniplexer: Arc<Omniplexer>,
}

impl GatewayHttpState {
    pub fn new(omniplexer: Omniplexer) -> Self {
        Self {
            omniplexer: Arc::new(omniplexer),
        }
    }

    pub fn omniplexer(&self) -> &Arc<Omniplexer> {
        &self.omniplexer
    }
}

/// Every GET path lands on the same handler; other methods get 405. axum
/// routes HEAD to GET handlers, so the handler turns it away itself.
pub fn router(state: GatewayHttpState) -> Router {
    Router::new()
        .route("/", get(handle_request))
        .route("/*path", get(handle_request))
        .with_state(state)
}

async fn handle_request(
    State(state): State<GatewayHttpState>,
    method: Method,
    uri: Uri,
) -> Response {
    if method != Method::GET {
        let mut response = StatusCode::METHOD_NOT_ALLOWED.into_response();
        response
            .headers_mut()
            .insert(header::ALLOW, HeaderValue::from_static("GET"));
        return response;
    }

    let path = uri.path();
    let span = tracing::info_span!("omniplexer_request", path = %path);

    match state
        .omniplexer
        .handle(path, uri.query())
        .instrument(span)
        .await
    {
        Ok(reply) => reply.into_response(),
        Err(err) => {
            tracing::error!(path = %path, error = %err, "request failed");
            text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                EXPOSITION_CONTENT_TYPE,
                Bytes::from_static(INTERNAL_ERROR_BODY.as_bytes()),
            )
        }
    }
}

impl IntoResponse for GatewayReply {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_GATEWAY);
        text_response(status, &self.content_type, self.body)
    }
}

fn text_response(status: StatusCode, content_type: &str, body: Bytes) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(EXPOSITION_CONTENT_TYPE)),
    );
    (status, headers, body).into_response()
}
