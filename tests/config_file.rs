use std::io::Write as _;

use omniplexer::gateway::config::ConfigError;
use omniplexer::{GatewayConfig, OmniplexerError, ServerRegistry};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_servers_from_file_in_section_order() -> omniplexer::Result<()> {
    let file = write_config(
        r#"
listen = "0.0.0.0:9099"

[servers.zeta]
url = "http://zeta:9100/"
prefix = "z"
bearer = "tok"

[servers.alpha]
url = "http://alpha:9100"
username = "user"
password = "pass"
"#,
    );

    let config = GatewayConfig::from_path(file.path())?;
    assert_eq!(config.listen.as_deref(), Some("0.0.0.0:9099"));

    let registry = ServerRegistry::from_config(&config)?;
    let names: Vec<&str> = registry.iter().map(|server| server.name.as_str()).collect();
    assert_eq!(names, vec!["zeta", "alpha"]);

    let zeta = registry.get("zeta").expect("zeta");
    assert_eq!(zeta.base_url, "http://zeta:9100");
    assert_eq!(zeta.prefix.as_deref(), Some("z"));
    assert_eq!(zeta.authorization(), Some("Bearer tok"));

    let alpha = registry.get("alpha").expect("alpha");
    assert_eq!(alpha.prefix, None);
    assert_eq!(alpha.authorization(), Some("Basic dXNlcjpwYXNz"));
    Ok(())
}

#[test]
fn section_without_url_fails_registry_load() {
    let file = write_config("[servers.broken]\nprefix = \"b\"\n");
    let config = GatewayConfig::from_path(file.path()).expect("parse");
    let err = ServerRegistry::from_config(&config).expect_err("missing url");
    assert!(matches!(err, ConfigError::MissingUrl { ref server } if server == "broken"));
}

#[test]
fn missing_file_surfaces_io_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = GatewayConfig::from_path(dir.path().join("absent.toml")).expect_err("missing file");
    assert!(matches!(err, OmniplexerError::Io(_)));
}

#[test]
fn malformed_toml_surfaces_parse_error() {
    let file = write_config("[servers.a\nurl = ");
    let err = GatewayConfig::from_path(file.path()).expect_err("bad toml");
    assert!(matches!(err, OmniplexerError::Config(ConfigError::Parse(_))));
}
