//! Metrics multiplexing gateway.

pub mod config;
pub mod fetch;
pub mod http;
pub mod logging;
pub mod metrics_prometheus;
#[cfg(feature = "otel")]
pub mod otel;
pub mod rewrite;
pub mod router;
pub mod stats;
pub mod upstream;

use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

use fetch::{FetchTarget, ParallelFetcher};
use metrics_prometheus::{EXPOSITION_CONTENT_TYPE, render_self_metrics};
use rewrite::rewrite_metrics;
use router::{Route, classify};
use stats::{GlobalStats, ServerStats, StatsEngine};
use upstream::UpstreamClient;

pub use config::{ConfigError, GatewayConfig, ServerConfig, ServerRegistry, ServerSection};
pub use fetch::{FetchOutcome, FetchResult, UpstreamBody};

pub const SINGLE_PROXY_ERROR_BODY: &str = "# Error fetching metrics from server";
pub const INTERNAL_ERROR_BODY: &str = "# Internal server error";
pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("upstream client error: {message}")]
    Client { message: String },
    #[error("internal error: {message}")]
    Internal { message: String },
}

pub trait Clock: Send + Sync {
    fn now_epoch_seconds(&self) -> u64;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_seconds(&self) -> u64 {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_else(|_| std::time::Duration::from_secs(0));
        now.as_secs()
    }
}

/// Fully rendered response for one inbound request. Single-proxy bodies are
/// the upstream bytes untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayReply {
    pub status: u16,
    pub content_type: String,
    pub body: Bytes,
}

impl GatewayReply {
    fn exposition(body: String) -> Self {
        Self {
            status: 200,
            content_type: EXPOSITION_CONTENT_TYPE.to_string(),
            body: Bytes::from(body),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub struct Omniplexer {
    registry: ServerRegistry,
    fetcher: ParallelFetcher,
    stats: Mutex<StatsEngine>,
}

impl Omniplexer {
    pub fn new(registry: ServerRegistry) -> Result<Self, GatewayError> {
        Self::with_clock(registry, Box::new(SystemClock))
    }

    pub fn with_clock(registry: ServerRegistry, clock: Box<dyn Clock>) -> Result<Self, GatewayError> {
        let stats = StatsEngine::for_registry(&registry, clock);
        Ok(Self {
            registry,
            fetcher: ParallelFetcher::new(UpstreamClient::new()?),
            stats: Mutex::new(stats),
        })
    }

    /// Overrides the per-upstream timeout (5000 ms by default).
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        let client = self.fetcher.client().clone().with_timeout(timeout);
        self.fetcher = ParallelFetcher::new(client);
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetcher.client().timeout()
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    pub async fn server_stats(&self, name: &str) -> Option<ServerStats> {
        self.stats.lock().await.server(name).cloned()
    }

    pub async fn global_stats(&self) -> GlobalStats {
        self.stats.lock().await.global().clone()
    }

    /// Routes one inbound GET. `path` drives classification; `query` is
    /// forwarded to every upstream untouched.
    pub async fn handle(&self, path: &str, query: Option<&str>) -> Result<GatewayReply, GatewayError> {
        self.stats.lock().await.record_request();

        let route = classify(path, &self.registry);
        tracing::debug!(path, route = route.kind(), "routing request");

        match route {
            Route::Health => {
                let body = serde_json::to_string(&HealthResponse { status: "ok" }).map_err(|err| {
                    GatewayError::Internal {
                        message: format!("failed to encode health response: {err}"),
                    }
                })?;
                Ok(GatewayReply {
                    status: 200,
                    content_type: JSON_CONTENT_TYPE.to_string(),
                    body: Bytes::from(body),
                })
            }
            Route::SelfMetrics => {
                let body = {
                    let stats = self.stats.lock().await;
                    render_self_metrics(&stats, &self.registry)
                };
                Ok(GatewayReply::exposition(body))
            }
            Route::Single { server, path } => {
                let target = FetchTarget::for_server(server, path, query);
                match self.fetcher.fetch_one(target, &self.stats).await {
                    Some(upstream) => Ok(GatewayReply {
                        status: upstream.status,
                        content_type: upstream
                            .content_type
                            .unwrap_or_else(|| EXPOSITION_CONTENT_TYPE.to_string()),
                        body: upstream.body,
                    }),
                    None => Ok(GatewayReply {
                        status: 502,
                        content_type: EXPOSITION_CONTENT_TYPE.to_string(),
                        body: Bytes::from_static(SINGLE_PROXY_ERROR_BODY.as_bytes()),
                    }),
                }
            }
            Route::SharedPrefix { servers, path } => {
                let targets = servers
                    .iter()
                    .map(|server| FetchTarget::for_server(server, path, query))
                    .collect();
                let results = self.fetcher.fetch_all(targets, &self.stats).await;
                let blocks = results.into_iter().filter_map(|result| {
                    let name = result.server_name.clone();
                    result
                        .into_success()
                        .map(|upstream| metrics_block(&name, &upstream.text()))
                });
                Ok(GatewayReply::exposition(join_blocks(blocks)))
            }
            Route::Aggregate { path } => {
                let targets = self
                    .registry
                    .iter()
                    .map(|server| FetchTarget::for_server(server, path, query))
                    .collect();
                let results = self.fetcher.fetch_all(targets, &self.stats).await;
                let blocks = results.into_iter().filter_map(|result| {
                    let name = result.server_name.clone();
                    let upstream = result.into_success()?;
                    let prefix = self
                        .registry
                        .get(&name)
                        .and_then(|server| server.prefix.as_deref());
                    let text = upstream.text();
                    let body = match prefix {
                        Some(prefix) => rewrite_metrics(&text, prefix),
                        None => text,
                    };
                    Some(metrics_block(&name, &body))
                });
                Ok(GatewayReply::exposition(join_blocks(blocks)))
            }
        }
    }
}

fn metrics_block(server: &str, body: &str) -> String {
    format!("# Metrics from {server}\n{body}")
}

fn join_blocks(blocks: impl Iterator<Item = String>) -> String {
    blocks.collect::<Vec<_>>().join("\n\n")
}
