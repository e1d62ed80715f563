use std::collections::HashMap;

use super::Clock;
use super::config::ServerRegistry;

/// Per-upstream counters. Every attempt, successful or not, contributes a sample.
#[derive(Clone, Debug, Default)]
pub struct ServerStats {
    request_count: u64,
    error_count: u64,
    total_response_time_ms: f64,
    response_times_ms: Vec<f64>,
    min_response_time_ms: Option<f64>,
    max_response_time_ms: Option<f64>,
}

impl ServerStats {
    pub fn record_sample(&mut self, elapsed_ms: f64) {
        self.request_count = self.request_count.saturating_add(1);
        self.response_times_ms.push(elapsed_ms);
        self.total_response_time_ms += elapsed_ms;
        if self.min_response_time_ms.is_none_or(|min| elapsed_ms < min) {
            self.min_response_time_ms = Some(elapsed_ms);
        }
        if self.max_response_time_ms.is_none_or(|max| elapsed_ms > max) {
            self.max_response_time_ms = Some(elapsed_ms);
        }
    }

    pub fn record_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }

    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    pub fn total_response_time_ms(&self) -> f64 {
        self.total_response_time_ms
    }

    pub fn response_times_ms(&self) -> &[f64] {
        &self.response_times_ms
    }

    pub fn min_response_time_ms(&self) -> Option<f64> {
        self.min_response_time_ms
    }

    pub fn max_response_time_ms(&self) -> Option<f64> {
        self.max_response_time_ms
    }

    pub fn avg_response_time_ms(&self) -> f64 {
        if self.request_count == 0 {
            return 0.0;
        }
        self.total_response_time_ms / self.request_count as f64
    }

    /// Nearest-rank percentile for `p` in `(0, 1]`; `None` without samples.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        let n = self.response_times_ms.len();
        if n == 0 {
            return None;
        }
        let mut sorted = self.response_times_ms.clone();
        sorted.sort_by(f64::total_cmp);

        let rank = (p * n as f64).ceil() as i64 - 1;
        let idx = rank.clamp(0, n as i64 - 1) as usize;
        Some(sorted[idx])
    }

    /// 100% until the first request is recorded.
    pub fn success_rate(&self) -> f64 {
        if self.request_count == 0 {
            return 100.0;
        }
        let ok = self.request_count.saturating_sub(self.error_count);
        ok as f64 / self.request_count as f64 * 100.0
    }
}

#[derive(Clone, Debug)]
pub struct GlobalStats {
    request_count: u64,
    error_count: u64,
    start_epoch_seconds: u64,
}

impl GlobalStats {
    pub fn new(start_epoch_seconds: u64) -> Self {
        Self {
            request_count: 0,
            error_count: 0,
            start_epoch_seconds,
        }
    }

    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    pub fn start_epoch_seconds(&self) -> u64 {
        self.start_epoch_seconds
    }
}

/// Process-wide aggregate of inbound and per-upstream counters.
///
/// Owned by the [`Omniplexer`](super::Omniplexer) behind a mutex and never
/// reset while the process runs.
pub struct StatsEngine {
    global: GlobalStats,
    servers: HashMap<String, ServerStats>,
    clock: Box<dyn Clock>,
}

impl std::fmt::Debug for StatsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsEngine")
            .field("global", &self.global)
            .field("servers", &self.servers)
            .finish_non_exhaustive()
    }
}

impl StatsEngine {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        let global = GlobalStats::new(clock.now_epoch_seconds());
        Self {
            global,
            servers: HashMap::new(),
            clock,
        }
    }

    /// Pre-creates an entry for every registered server.
    pub fn for_registry(registry: &ServerRegistry, clock: Box<dyn Clock>) -> Self {
        let mut engine = Self::new(clock);
        for server in registry {
            engine.servers.entry(server.name.clone()).or_default();
        }
        engine
    }

    pub fn record_request(&mut self) {
        self.global.request_count = self.global.request_count.saturating_add(1);
    }

    pub fn record_sample(&mut self, server: &str, elapsed_ms: f64) {
        self.server_entry(server).record_sample(elapsed_ms);
    }

    /// Counts one upstream failure against both the server and the global total.
    pub fn record_error(&mut self, server: &str) {
        self.global.error_count = self.global.error_count.saturating_add(1);
        self.server_entry(server).record_error();
    }

    pub fn global(&self) -> &GlobalStats {
        &self.global
    }

    pub fn server(&self, name: &str) -> Option<&ServerStats> {
        self.servers.get(name)
    }

    pub fn percentile(&self, server: &str, p: f64) -> Option<f64> {
        self.servers.get(server).and_then(|stats| stats.percentile(p))
    }

    pub fn success_rate(&self, server: &str) -> f64 {
        self.servers
            .get(server)
            .map(ServerStats::success_rate)
            .unwrap_or(100.0)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.clock
            .now_epoch_seconds()
            .saturating_sub(self.global.start_epoch_seconds)
    }

    fn server_entry(&mut self, server: &str) -> &mut ServerStats {
        self.servers.entry(server.to_string()).or_default()
    }
}
