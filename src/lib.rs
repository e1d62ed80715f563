mod error;

pub mod gateway;

pub use error::{OmniplexerError, Result};
pub use gateway::{
    GatewayConfig, GatewayError, GatewayReply, Omniplexer, ServerConfig, ServerRegistry,
};
