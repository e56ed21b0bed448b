/// Error types for the CO2 watcher
pub mod error;

/// Point addressing and value types
pub mod points;

/// In-memory point table and existence checking
pub mod registry;

/// Typed per-address event bus
pub mod bus;

/// Configuration management
pub mod config;

/// Group discovery bootstrapping
pub mod discovery;

/// Sensor group core: validity, aggregation, classification
pub mod group;

/// Published control surface
pub mod surface;

/// Input bridge feeding point updates into the event loop
pub mod input;

// Re-export commonly used types
pub use error::{AddressError, ConfigError, DiscoveryError, InputError};
