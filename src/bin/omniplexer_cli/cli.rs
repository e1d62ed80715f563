use std::path::PathBuf;

pub(crate) const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

/// Multiplexes several OpenMetrics endpoints behind one HTTP listener.
#[derive(clap::Parser, Debug)]
#[command(name = "omniplexer", version)]
pub(crate) struct OmniplexerCliArgs {
    /// TOML file with `[servers.<name>]` sections
    pub config: PathBuf,

    /// Address to bind (overrides `listen` in the config file)
    #[arg(long)]
    pub listen: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Export spans over OTLP/HTTP (requires the `otel` feature)
    #[arg(long)]
    pub otel: bool,

    /// OTLP collector endpoint; implies --otel
    #[arg(long)]
    pub otel_endpoint: Option<String>,
}

impl OmniplexerCliArgs {
    pub(crate) fn otel_enabled(&self) -> bool {
        self.otel || self.otel_endpoint.is_some()
    }

    pub(crate) fn listen_addr(&self, config_listen: Option<&str>) -> String {
        self.listen
            .as_deref()
            .or(config_listen)
            .unwrap_or(DEFAULT_LISTEN)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser as _;

    use super::*;

    #[test]
    fn listen_prefers_flag_then_config_then_default() {
        let args = OmniplexerCliArgs::parse_from(["omniplexer", "omni.toml"]);
        assert_eq!(args.listen_addr(None), DEFAULT_LISTEN);
        assert_eq!(args.listen_addr(Some("0.0.0.0:9000")), "0.0.0.0:9000");

        let args =
            OmniplexerCliArgs::parse_from(["omniplexer", "omni.toml", "--listen", "[::1]:7000"]);
        assert_eq!(args.listen_addr(Some("0.0.0.0:9000")), "[::1]:7000");
    }

    #[test]
    fn otel_endpoint_implies_otel() {
        let args = OmniplexerCliArgs::parse_from([
            "omniplexer",
            "omni.toml",
            "--otel-endpoint",
            "http://collector:4318",
        ]);
        assert!(args.otel_enabled());
        assert!(!OmniplexerCliArgs::parse_from(["omniplexer", "omni.toml"]).otel_enabled());
    }
}
