use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderValue};

use super::GatewayError;

pub const UPSTREAM_TIMEOUT: Duration = Duration::from_millis(5000);
const MAX_REDIRECTS: usize = 10;

/// Shared outbound client used for every upstream GET.
#[derive(Clone, Debug)]
pub struct UpstreamClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new() -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|err| GatewayError::Client {
                message: format!("upstream http client error: {err}"),
            })?;
        Ok(Self {
            client,
            timeout: UPSTREAM_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Issues a GET bounded by the per-request timeout. The timeout covers the
    /// whole exchange, body included, once the caller reads it.
    pub async fn get(
        &self,
        url: &str,
        auth_header: Option<&HeaderValue>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut req = self.client.get(url).timeout(self.timeout);
        if let Some(value) = auth_header {
            req = req.header(AUTHORIZATION, value.clone());
        }
        req.send().await
    }
}

pub fn join_base_url(base_url: &str, path: &str, query: Option<&str>) -> String {
    let base = base_url.trim_end_matches('/');
    let mut out = String::with_capacity(base.len() + path.len() + 1);
    out.push_str(base);
    if !path.is_empty() && !path.starts_with('/') {
        out.push('/');
    }
    out.push_str(path);
    if let Some(query) = query.filter(|query| !query.is_empty()) {
        out.push('?');
        out.push_str(query);
    }
    out
}
