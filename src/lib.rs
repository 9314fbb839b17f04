// ABOUTME: Library root for adsb-relay
// ABOUTME: Exposes configuration, the relay loops and event sinks to the binary and tests

pub mod config;
pub mod error;
pub mod relay;
pub mod sink;
pub mod utils;

pub use config::{AppConfig, Cli, RelayConfig, SinkTarget};
pub use error::{RelayError, Result};
pub use relay::{Relay, RelayHandle};
pub use sink::{EventSink, SinkError};
