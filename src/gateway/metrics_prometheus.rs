use super::config::ServerRegistry;
use super::stats::{ServerStats, StatsEngine};

pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Renders the gateway's own counters, servers in registry order.
pub fn render_self_metrics(stats: &StatsEngine, registry: &ServerRegistry) -> String {
    let mut out = String::new();
    let global = stats.global();

    out.push_str("# Self metrics for Omniplexer\n");
    out.push_str(&format!(
        "omniplexer_requests_total {}\n",
        global.request_count()
    ));
    out.push_str(&format!("omniplexer_errors_total {}\n", global.error_count()));
    out.push_str(&format!(
        "omniplexer_uptime_seconds {}\n",
        stats.uptime_seconds()
    ));

    let empty = ServerStats::default();
    for server in registry {
        let server_stats = stats.server(&server.name).unwrap_or(&empty);
        write_server_metrics(&mut out, &escape_label_value(&server.name), server_stats);
    }
    out
}

fn write_server_metrics(out: &mut String, label: &str, stats: &ServerStats) {
    out.push_str(&format!(
        "omniplexer_server_requests_total{{server=\"{label}\"}} {}\n",
        stats.request_count()
    ));
    out.push_str(&format!(
        "omniplexer_server_errors_total{{server=\"{label}\"}} {}\n",
        stats.error_count()
    ));
    out.push_str(&format!(
        "omniplexer_server_avg_response_time_msecs{{server=\"{label}\"}} {:.3}\n",
        stats.avg_response_time_ms()
    ));
    out.push_str(&format!(
        "omniplexer_server_success_rate_percent{{server=\"{label}\"}} {:.2}\n",
        stats.success_rate()
    ));

    if stats.response_times_ms().is_empty() {
        return;
    }

    for (name, p) in [("p50", 0.50), ("p95", 0.95), ("p99", 0.99)] {
        if let Some(value) = stats.percentile(p) {
            out.push_str(&format!(
                "omniplexer_server_response_time_{name}_msecs{{server=\"{label}\"}} {value:.3}\n"
            ));
        }
    }
    write_optional_msecs(out, "omniplexer_server_min_response_time_msecs", label, stats.min_response_time_ms());
    write_optional_msecs(out, "omniplexer_server_max_response_time_msecs", label, stats.max_response_time_ms());
}

fn write_optional_msecs(out: &mut String, metric: &str, label: &str, value: Option<f64>) {
    if let Some(value) = value {
        out.push_str(&format!("{metric}{{server=\"{label}\"}} {value:.3}\n"));
    }
}

fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Clock;
    use crate::gateway::config::ServerSection;

    struct FixedClock(u64);

    impl Clock for FixedClock {
        fn now_epoch_seconds(&self) -> u64 {
            self.0
        }
    }

    fn registry(names: &[&str]) -> ServerRegistry {
        ServerRegistry::load(
            names
                .iter()
                .map(|name| (name.to_string(), ServerSection::new("http://localhost:9100"))),
        )
        .expect("registry")
    }

    #[test]
    fn escapes_label_values() {
        assert_eq!(escape_label_value("a"), "a");
        assert_eq!(escape_label_value("a\"b"), "a\\\"b");
        assert_eq!(escape_label_value("a\\b"), "a\\\\b");
        assert_eq!(escape_label_value("a\nb"), "a\\nb");
    }

    #[test]
    fn server_without_samples_omits_latency_lines() {
        let registry = registry(&["idle"]);
        let stats = StatsEngine::for_registry(&registry, Box::new(FixedClock(10)));
        let rendered = render_self_metrics(&stats, &registry);

        assert_eq!(
            rendered,
            "# Self metrics for Omniplexer\n\
             omniplexer_requests_total 0\n\
             omniplexer_errors_total 0\n\
             omniplexer_uptime_seconds 0\n\
             omniplexer_server_requests_total{server=\"idle\"} 0\n\
             omniplexer_server_errors_total{server=\"idle\"} 0\n\
             omniplexer_server_avg_response_time_msecs{server=\"idle\"} 0.000\n\
             omniplexer_server_success_rate_percent{server=\"idle\"} 100.00\n"
        );
    }

    #[test]
    fn renders_percentiles_and_bounds_once_sampled() {
        let registry = registry(&["s", "other"]);
        let mut stats = StatsEngine::for_registry(&registry, Box::new(FixedClock(10)));
        stats.record_request();
        for ms in [10.0, 20.0, 30.0, 40.0] {
            stats.record_sample("s", ms);
        }
        stats.record_error("s");

        let rendered = render_self_metrics(&stats, &registry);
        assert!(rendered.contains("omniplexer_requests_total 1\n"));
        assert!(rendered.contains("omniplexer_errors_total 1\n"));
        assert!(rendered.contains("omniplexer_server_requests_total{server=\"s\"} 4\n"));
        assert!(rendered.contains("omniplexer_server_errors_total{server=\"s\"} 1\n"));
        assert!(rendered.contains("omniplexer_server_avg_response_time_msecs{server=\"s\"} 25.000\n"));
        assert!(rendered.contains("omniplexer_server_success_rate_percent{server=\"s\"} 75.00\n"));
        assert!(rendered.contains("omniplexer_server_response_time_p50_msecs{server=\"s\"} 20.000\n"));
        assert!(rendered.contains("omniplexer_server_response_time_p95_msecs{server=\"s\"} 40.000\n"));
        assert!(rendered.contains("omniplexer_server_response_time_p99_msecs{server=\"s\"} 40.000\n"));
        assert!(rendered.contains("omniplexer_server_min_response_time_msecs{server=\"s\"} 10.000\n"));
        assert!(rendered.contains("omniplexer_server_max_response_time_msecs{server=\"s\"} 40.000\n"));
        assert!(!rendered.contains("omniplexer_server_response_time_p50_msecs{server=\"other\"}"));

        let s_at = rendered.find("{server=\"s\"}").unwrap();
        let other_at = rendered.find("{server=\"other\"}").unwrap();
        assert!(s_at < other_at);
    }
}
