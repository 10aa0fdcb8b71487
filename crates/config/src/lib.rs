// Configuration loading

pub mod error;
pub mod settings;

pub use error::ConfigError;
pub use settings::{
    resolve_secret, BridgeSettings, ConsoleSettings, CredentialSettings, ExtractionSettings,
    FilterSettings, Settings,
};
