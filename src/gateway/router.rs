use super::config::{ServerConfig, ServerRegistry};

/// What an inbound path resolves to, in priority order.
#[derive(Debug)]
pub enum Route<'a> {
    Health,
    SelfMetrics,
    /// Exactly one server's prefix matched.
    Single {
        server: &'a ServerConfig,
        path: &'a str,
    },
    /// Several servers matched; `path` is stripped with the first match's prefix.
    SharedPrefix {
        servers: Vec<&'a ServerConfig>,
        path: &'a str,
    },
    /// No prefix matched; every server is fetched with the original path.
    Aggregate { path: &'a str },
}

impl Route<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Route::Health => "health",
            Route::SelfMetrics => "self_metrics",
            Route::Single { .. } => "single",
            Route::SharedPrefix { .. } => "shared_prefix",
            Route::Aggregate { .. } => "aggregate",
        }
    }
}

pub fn classify<'a>(path: &'a str, registry: &'a ServerRegistry) -> Route<'a> {
    match path {
        "/health" => return Route::Health,
        "/metrics" | "/self-metrics" => return Route::SelfMetrics,
        _ => {}
    }

    let mut matched: Vec<(&ServerConfig, &str)> = registry
        .iter()
        .filter_map(|server| {
            server
                .strip_route_prefix(path)
                .map(|stripped| (server, stripped))
        })
        .collect();

    match matched.len() {
        0 => Route::Aggregate { path },
        1 => {
            let (server, stripped) = matched.remove(0);
            Route::Single {
                server,
                path: stripped,
            }
        }
        _ => {
            let stripped = matched[0].1;
            Route::SharedPrefix {
                servers: matched.into_iter().map(|(server, _)| server).collect(),
                path: stripped,
            }
        }
    }
}
