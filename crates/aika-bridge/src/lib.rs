//! Concrete collaborators for the Aika core: config loading, token-cache credentials and
//! the JSON-lines transport to the protocol bridge sidecar.

pub mod config;
pub mod config_loader;
pub mod credentials;
pub mod line_transport;

pub use config::{AikaConfig, CONFIG_FILE};
pub use config_loader::ConfigLoader;
pub use credentials::{TokenCacheProvider, TokenSource};
pub use line_transport::LineBridgeFactory;
