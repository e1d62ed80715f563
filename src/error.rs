use thiserror::Error;

use crate::gateway::GatewayError;
use crate::gateway::config::ConfigError;

#[derive(Debug, Error)]
pub enum OmniplexerError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OmniplexerError>;
