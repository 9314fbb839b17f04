// ABOUTME: Dry-run sink that prints each outbound message as one JSON line
// ABOUTME: Lets the relay run against a receiver without a broker

use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

use super::{EventSink, SinkError};

pub struct StdoutSink {
    out: Mutex<Stdout>,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            out: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSink for StdoutSink {
    async fn publish(&self, body: &[u8]) -> Result<(), SinkError> {
        let mut out = self.out.lock().await;
        out.write_all(body).await?;
        out.write_all(b"\n").await?;
        out.flush().await?;
        Ok(())
    }

    fn describe(&self) -> String {
        "stdout (dry run)".to_string()
    }
}
