// ABOUTME: Wires the position store, ingest loop and publish loop into one relay
// ABOUTME: Both loops run as tokio tasks and stop on a shared broadcast shutdown signal

mod ingest;
mod publish;

pub use ingest::{IngestLoop, IngestOutcome, IngestStats};
pub use publish::{PublishLoop, PublishStats};

use std::sync::Arc;

use position_store::PositionStore;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::sink::EventSink;

/// A validated relay ready to start.
///
/// The store is shared with the caller; the sink is used only by the
/// publish loop.
pub struct Relay {
    config: RelayConfig,
    store: Arc<PositionStore>,
    sink: Arc<dyn EventSink>,
}

#[derive(Default)]
pub struct RelayBuilder {
    config: Option<RelayConfig>,
    store: Option<Arc<PositionStore>>,
    sink: Option<Arc<dyn EventSink>>,
}

impl RelayBuilder {
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn store(mut self, store: Arc<PositionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Fails without starting anything when the store, sink or configuration
    /// is missing, or the configuration is invalid.
    pub fn build(self) -> Result<Relay> {
        let store = self.store.ok_or(RelayError::MissingStore)?;
        let sink = self.sink.ok_or(RelayError::MissingSink)?;
        let config = self.config.ok_or(RelayError::MissingConfig)?;
        config.validate()?;

        Ok(Relay {
            config,
            store,
            sink,
        })
    }
}

impl Relay {
    pub fn builder() -> RelayBuilder {
        RelayBuilder::default()
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn ingest_loop(&self) -> IngestLoop {
        IngestLoop::new(self.config.clone(), Arc::clone(&self.store))
    }

    pub fn publish_loop(&self) -> PublishLoop {
        PublishLoop::new(
            Arc::clone(&self.store),
            Arc::clone(&self.sink),
            self.config.publish_interval,
        )
    }

    /// Start both loops. Each subscribes to `shutdown` before this returns.
    pub fn spawn(self, shutdown: &broadcast::Sender<()>) -> RelayHandle {
        let ingest = tokio::spawn(self.ingest_loop().run(shutdown.subscribe()));
        let publish = tokio::spawn(self.publish_loop().run(shutdown.subscribe()));
        RelayHandle { ingest, publish }
    }
}

pub struct RelayHandle {
    ingest: JoinHandle<()>,
    publish: JoinHandle<()>,
}

impl RelayHandle {
    /// Wait for both loops to finish after shutdown has been signalled.
    pub async fn join(self) {
        let (ingest, publish) = tokio::join!(self.ingest, self.publish);
        if let Err(e) = ingest {
            tracing::error!("Ingest loop task failed: {}", e);
        }
        if let Err(e) = publish {
            tracing::error!("Publish loop task failed: {}", e);
        }
    }
}
