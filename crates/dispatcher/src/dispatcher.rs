//! Dispatcher - fan-out of gated commands to sinks

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use contracts::{SinkConfig, SinkType};
use safety_gate::Command;

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{FileSink, LogSink, NetworkSink};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub sinks: Vec<SinkConfig>,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    input_rx: mpsc::Receiver<Command>,
}

impl DispatcherBuilder {
    pub fn new(config: DispatcherConfig, input_rx: mpsc::Receiver<Command>) -> Self {
        Self { config, input_rx }
    }

    /// Create every sink and its worker
    #[instrument(name = "dispatcher_builder_build", skip(self))]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let mut handles = Vec::with_capacity(self.config.sinks.len());
        for sink_config in &self.config.sinks {
            handles.push(create_sink_handle(sink_config).await?);
        }

        Ok(Dispatcher {
            handles,
            input_rx: self.input_rx,
        })
    }
}

#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
async fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        SinkType::Log => {
            let sink = LogSink::new(&config.name);
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}

/// Consumes commands and fans them out to every sink
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input_rx: mpsc::Receiver<Command>,
}

impl Dispatcher {
    /// Create a dispatcher with custom sink handles
    pub fn with_handles(handles: Vec<SinkHandle>, input_rx: mpsc::Receiver<Command>) -> Self {
        Self { handles, input_rx }
    }

    pub fn sink_count(&self) -> usize {
        self.handles.len()
    }

    /// Per-sink metrics
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Run until the input channel closes, then shut every sink down.
    ///
    /// Returns final per-sink metrics.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) -> Vec<(String, MetricsSnapshot)> {
        info!(sinks = self.handles.len(), "dispatcher started");

        let mut command_count: u64 = 0;
        while let Some(command) = self.input_rx.recv().await {
            command_count += 1;
            for handle in &self.handles {
                handle.try_send(command.clone());
            }
            if command_count.is_multiple_of(100) {
                debug!(commands = command_count, "dispatcher progress");
            }
        }

        info!(commands = command_count, "dispatcher input closed, shutting down");

        let handles = std::mem::take(&mut self.handles);
        let mut summary = Vec::with_capacity(handles.len());
        for handle in handles {
            let name = handle.name().to_string();
            let metrics = handle.metrics().clone();
            handle.shutdown().await;
            summary.push((name, metrics.snapshot()));
        }

        info!("dispatcher shutdown complete");
        summary
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> JoinHandle<Vec<(String, MetricsSnapshot)>> {
        tokio::spawn(self.run())
    }
}

/// Create a dispatcher from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs, input_rx))]
pub async fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    input_rx: mpsc::Receiver<Command>,
) -> Result<Dispatcher, DispatcherError> {
    let config = DispatcherConfig {
        sinks: sink_configs,
    };
    DispatcherBuilder::new(config, input_rx).build().await
}
