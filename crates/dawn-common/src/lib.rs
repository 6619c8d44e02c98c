pub mod config;

pub use config::{ConfigError, ConfigSource, LoaderConfig, UnitFormat};
