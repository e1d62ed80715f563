pub(crate) fn init_logging(json_logs: bool) -> Result<(), Box<dyn std::error::Error>> {
    omniplexer::gateway::logging::init_tracing(json_logs)
}

#[cfg(feature = "otel")]
pub(crate) fn attach_otel(
    enabled: bool,
    endpoint: Option<&str>,
    json_logs: bool,
) -> Result<Option<omniplexer::gateway::otel::OtelGuard>, Box<dyn std::error::Error>> {
    if !enabled {
        return Ok(None);
    }

    Ok(Some(omniplexer::gateway::otel::init_tracing(endpoint, json_logs)?))
}

#[cfg(not(feature = "otel"))]
pub(crate) fn attach_otel(
    enabled: bool,
    _endpoint: Option<&str>,
    _json_logs: bool,
) -> Result<Option<()>, Box<dyn std::error::Error>> {
    if enabled {
        return Err("otel requires `--features otel`".into());
    }
    Ok(None)
}
