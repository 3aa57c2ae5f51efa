//! Top-level error type for the collector.

use std::fmt;

use crate::control::CommandError;
use crate::runtime::config_loader::ConfigError;
use crate::sink::SinkError;
use crate::transport::TransportError;

/// Any error that stops the collector.
#[derive(Debug)]
pub enum CollectorError {
    Config(ConfigError),
    Transport(TransportError),
    Sink(SinkError),
    Command(CommandError),
    Io(std::io::Error),
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectorError::Config(e) => write!(f, "Configuration error: {}", e),
            CollectorError::Transport(e) => write!(f, "Transport error: {}", e),
            CollectorError::Sink(e) => write!(f, "Sink error: {}", e),
            CollectorError::Command(e) => write!(f, "Command error: {}", e),
            CollectorError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for CollectorError {}

impl From<ConfigError> for CollectorError {
    fn from(e: ConfigError) -> Self {
        CollectorError::Config(e)
    }
}

impl From<TransportError> for CollectorError {
    fn from(e: TransportError) -> Self {
        CollectorError::Transport(e)
    }
}

impl From<SinkError> for CollectorError {
    fn from(e: SinkError) -> Self {
        CollectorError::Sink(e)
    }
}

impl From<CommandError> for CollectorError {
    fn from(e: CommandError) -> Self {
        CollectorError::Command(e)
    }
}

impl From<std::io::Error> for CollectorError {
    fn from(e: std::io::Error) -> Self {
        CollectorError::Io(e)
    }
}
