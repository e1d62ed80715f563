use std::collections::HashSet;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("server `{server}` has an invalid section: {message}")]
    InvalidSection { server: String, message: String },
    #[error("server `{server}` is missing a url")]
    MissingUrl { server: String },
    #[error("duplicate server name: {server}")]
    DuplicateServer { server: String },
    #[error("server `{server}` credentials do not form a valid authorization header")]
    InvalidAuthHeader { server: String },
}

/// One `[servers.<name>]` table as written in the config file.
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub bearer: Option<String>,
}

impl std::fmt::Debug for ServerSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSection")
            .field("url", &self.url)
            .field("prefix", &self.prefix)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("bearer", &self.bearer.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ServerSection {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct RawGatewayConfig {
    #[serde(default)]
    listen: Option<String>,
    #[serde(default)]
    servers: toml::Table,
}

/// Parsed config file. `servers` keeps the order the sections appear in.
#[derive(Clone, Debug, Default)]
pub struct GatewayConfig {
    pub listen: Option<String>,
    pub servers: Vec<(String, ServerSection)>,
}

impl GatewayConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let raw: RawGatewayConfig = toml::from_str(raw)?;

        let mut servers = Vec::with_capacity(raw.servers.len());
        for (name, value) in raw.servers {
            let section =
                value
                    .try_into::<ServerSection>()
                    .map_err(|err| ConfigError::InvalidSection {
                        server: name.clone(),
                        message: err.to_string(),
                    })?;
            servers.push((name, section));
        }

        let listen = raw
            .listen
            .map(|listen| listen.trim().to_string())
            .filter(|listen| !listen.is_empty());
        Ok(Self { listen, servers })
    }

    pub fn from_path(path: impl AsRef<Path>) -> crate::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&raw)?)
    }
}

/// A validated upstream. Immutable once the registry is built.
#[derive(Clone)]
pub struct ServerConfig {
    pub name: String,
    pub base_url: String,
    pub prefix: Option<String>,
    /// Marked sensitive so it never shows up in header debug output.
    pub auth_header: Option<HeaderValue>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("prefix", &self.prefix)
            .field("auth_header", &self.auth_header.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ServerConfig {
    pub fn from_section(name: impl Into<String>, section: &ServerSection) -> Result<Self, ConfigError> {
        let name = name.into();
        let base_url = section
            .url
            .as_deref()
            .map(|url| url.trim().trim_end_matches('/'))
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ConfigError::MissingUrl {
                server: name.clone(),
            })?
            .to_string();

        let prefix = non_empty(&section.prefix).map(str::to_string);

        let auth_header = resolve_auth_header(section)
            .map(|header| {
                let mut value = HeaderValue::from_str(&header).map_err(|_| {
                    ConfigError::InvalidAuthHeader {
                        server: name.clone(),
                    }
                })?;
                value.set_sensitive(true);
                Ok::<_, ConfigError>(value)
            })
            .transpose()?;

        Ok(Self {
            name,
            base_url,
            prefix,
            auth_header,
        })
    }

    /// The resolved `Authorization` value as text, for inspection.
    pub fn authorization(&self) -> Option<&str> {
        self.auth_header
            .as_ref()
            .and_then(|value| value.to_str().ok())
    }

    /// Returns the remainder of `path` after `/{prefix}` when this server's
    /// prefix matches.
    pub fn strip_route_prefix<'a>(&self, path: &'a str) -> Option<&'a str> {
        let prefix = self.prefix.as_deref()?;
        path.strip_prefix('/')?.strip_prefix(prefix)
    }
}

/// Basic auth wins over a bearer token when both are configured.
fn resolve_auth_header(section: &ServerSection) -> Option<String> {
    match (non_empty(&section.username), non_empty(&section.password)) {
        (Some(username), Some(password)) => {
            let encoded = BASE64.encode(format!("{username}:{password}"));
            Some(format!("Basic {encoded}"))
        }
        _ => non_empty(&section.bearer).map(|token| format!("Bearer {token}")),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

/// Upstreams in config order.
#[derive(Clone, Debug, Default)]
pub struct ServerRegistry {
    servers: Vec<ServerConfig>,
}

impl ServerRegistry {
    pub fn load<I>(sections: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, ServerSection)>,
    {
        let mut seen = HashSet::new();
        let mut servers = Vec::new();
        for (name, section) in sections {
            if !seen.insert(name.clone()) {
                return Err(ConfigError::DuplicateServer { server: name });
            }
            servers.push(ServerConfig::from_section(name, &section)?);
        }

        let registry = Self { servers };
        for (shorter, longer) in registry.overlapping_prefixes() {
            tracing::warn!(
                server = shorter,
                other = longer,
                "server prefix is a leading substring of another server's prefix; \
                 multi-match requests strip the first match only"
            );
        }
        Ok(registry)
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        Self::load(config.servers.iter().cloned())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ServerConfig> {
        self.servers.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|server| server.name == name)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Pairs of server names whose distinct prefixes can both match one path.
    pub fn overlapping_prefixes(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        for shorter in &self.servers {
            let Some(short_prefix) = shorter.prefix.as_deref() else {
                continue;
            };
            for longer in &self.servers {
                let Some(long_prefix) = longer.prefix.as_deref() else {
                    continue;
                };
                if long_prefix != short_prefix && long_prefix.starts_with(short_prefix) {
                    out.push((shorter.name.as_str(), longer.name.as_str()));
                }
            }
        }
        out
    }
}

impl<'a> IntoIterator for &'a ServerRegistry {
    type Item = &'a ServerConfig;
    type IntoIter = std::slice::Iter<'a, ServerConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
