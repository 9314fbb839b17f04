// ABOUTME: Event sink abstraction the publish loop hands encoded records to
// ABOUTME: Implementations: RabbitMQ fanout exchange over the management API, stdout for dry runs

mod rabbitmq;
mod stdout;

pub use rabbitmq::{RabbitMqConfig, RabbitMqSink};
pub use stdout::StdoutSink;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("broker request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("broker rejected {operation} with status {status}: {body}")]
    Rejected {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("invalid broker url: {0}")]
    InvalidUrl(String),

    #[error("message body is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("failed to write message: {0}")]
    Io(#[from] std::io::Error),
}

/// Destination for changed aircraft records.
///
/// Each call carries exactly one JSON-encoded record. An error leaves the
/// record dirty so the next publish tick retries it.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// One-time setup before the first publish (e.g. declaring the exchange).
    async fn prepare(&self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn publish(&self, body: &[u8]) -> Result<(), SinkError>;

    /// Human-readable destination for logs. Must not contain credentials.
    fn describe(&self) -> String;
}
