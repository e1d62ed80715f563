use std::time::Instant;

use bytes::Bytes;
use reqwest::header::HeaderValue;
use tokio::sync::Mutex;
use tracing::Instrument as _;

use super::config::ServerConfig;
use super::stats::StatsEngine;
use super::upstream::{UpstreamClient, join_base_url};

#[derive(Clone, Debug)]
pub struct FetchTarget {
    pub name: String,
    pub url: String,
    pub auth_header: Option<HeaderValue>,
}

impl FetchTarget {
    pub fn for_server(server: &ServerConfig, path: &str, query: Option<&str>) -> Self {
        Self {
            name: server.name.clone(),
            url: join_base_url(&server.base_url, path, query),
            auth_header: server.auth_header.clone(),
        }
    }
}

/// Upstream payload exactly as received.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamBody {
    pub body: Bytes,
    pub status: u16,
    pub content_type: Option<String>,
}

impl UpstreamBody {
    /// Text view for concatenation and rewriting; invalid UTF-8 is replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(UpstreamBody),
    TransportFailure { cause: String },
    HttpFailure { status: u16 },
}

#[derive(Clone, Debug)]
pub struct FetchResult {
    pub server_name: String,
    pub elapsed_ms: f64,
    pub outcome: FetchOutcome,
}

impl FetchResult {
    pub fn is_failure(&self) -> bool {
        !matches!(self.outcome, FetchOutcome::Success(_))
    }

    pub fn into_success(self) -> Option<UpstreamBody> {
        match self.outcome {
            FetchOutcome::Success(body) => Some(body),
            FetchOutcome::TransportFailure { .. } | FetchOutcome::HttpFailure { .. } => None,
        }
    }
}

/// Fans a GET out to every target at once and waits for all of them.
///
/// Each target carries its own timeout; there is no shared deadline and no
/// early return. Every completion is recorded into the stats engine before
/// the call returns.
#[derive(Clone, Debug)]
pub struct ParallelFetcher {
    client: UpstreamClient,
}

impl ParallelFetcher {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &UpstreamClient {
        &self.client
    }

    /// Results come back in target order regardless of completion order.
    pub async fn fetch_all(
        &self,
        targets: Vec<FetchTarget>,
        stats: &Mutex<StatsEngine>,
    ) -> Vec<FetchResult> {
        tracing::debug!(targets = targets.len(), "fetching upstreams");
        futures_util::future::join_all(
            targets
                .into_iter()
                .map(|target| self.fetch_and_record(target, stats)),
        )
        .await
    }

    pub async fn fetch_one(
        &self,
        target: FetchTarget,
        stats: &Mutex<StatsEngine>,
    ) -> Option<UpstreamBody> {
        self.fetch_and_record(target, stats).await.into_success()
    }

    async fn fetch_and_record(&self, target: FetchTarget, stats: &Mutex<StatsEngine>) -> FetchResult {
        let span = tracing::info_span!("upstream_fetch", server = %target.name, url = %target.url);
        async {
            let result = self.fetch_target(&target).await;
            record_result(&result, stats).await;
            result
        }
        .instrument(span)
        .await
    }

    async fn fetch_target(&self, target: &FetchTarget) -> FetchResult {
        let started = Instant::now();
        let outcome = match self.client.get(&target.url, target.auth_header.as_ref()).await {
            Err(err) => FetchOutcome::TransportFailure {
                cause: err.to_string(),
            },
            Ok(response) => {
                let status = response.status().as_u16();
                if status >= 400 {
                    FetchOutcome::HttpFailure { status }
                } else {
                    let content_type = response
                        .headers()
                        .get(reqwest::header::CONTENT_TYPE)
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string);
                    match response.bytes().await {
                        Ok(body) => FetchOutcome::Success(UpstreamBody {
                            body,
                            status,
                            content_type,
                        }),
                        Err(err) => FetchOutcome::TransportFailure {
                            cause: err.to_string(),
                        },
                    }
                }
            }
        };

        FetchResult {
            server_name: target.name.clone(),
            elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
            outcome,
        }
    }
}

async fn record_result(result: &FetchResult, stats: &Mutex<StatsEngine>) {
    match &result.outcome {
        FetchOutcome::Success(_) => {}
        FetchOutcome::TransportFailure { cause } => {
            tracing::error!(server = %result.server_name, error = %cause, "Curl error");
        }
        FetchOutcome::HttpFailure { status } => {
            tracing::error!(server = %result.server_name, status = *status, "HTTP error");
        }
    }

    let mut stats = stats.lock().await;
    stats.record_sample(&result.server_name, result.elapsed_ms);
    if result.is_failure() {
        stats.record_error(&result.server_name);
    }
}
