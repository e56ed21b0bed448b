use thiserror::Error;

/// Errors that can occur while parsing point addresses
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Address must have the form device/control: {0}")]
    MissingSeparator(String),

    #[error("Address has an empty device or control segment: {0}")]
    EmptySegment(String),
}

/// Errors that can occur during group discovery
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Group '{0}' has no target sensors configured")]
    NoTargets(String),

    #[error("Group '{0}': no target sensor became reachable within the probe budget")]
    NoMembers(String),
}

/// Errors that can occur in the input bridge
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Failed to parse input line: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}
