//! FileSink - appends commands to a JSONL file

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use contracts::ContractError;
use safety_gate::Command;
use tracing::{debug, instrument};

use crate::sink::CommandSink;

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file; parent directories are created
    pub path: PathBuf,
}

impl FileSinkConfig {
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let path = params
            .get("path")
            .ok_or_else(|| "missing 'path' parameter".to_string())?;
        Ok(Self {
            path: PathBuf::from(path),
        })
    }
}

/// Sink that writes one JSON command per line
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&config.path)?;

        Ok(Self {
            name: name.into(),
            config,
            writer: Some(BufWriter::new(file)),
        })
    }

    pub fn from_params(name: impl Into<String>, params: &HashMap<String, String>) -> std::io::Result<Self> {
        let config = FileSinkConfig::from_params(params).map_err(std::io::Error::other)?;
        Self::new(name, config)
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>, ContractError> {
        let name = &self.name;
        self.writer
            .as_mut()
            .ok_or_else(|| ContractError::sink_write(name, "file sink is closed"))
    }
}

impl CommandSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_send",
        skip(self, command),
        fields(sink = %self.name, command = %command.command_type())
    )]
    async fn send(&mut self, command: &Command) -> Result<(), ContractError> {
        let name = self.name.clone();
        let writer = self.writer()?;
        serde_json::to_writer(&mut *writer, command)
            .map_err(|e| ContractError::sink_write(&name, e.to_string()))?;
        writer
            .write_all(b"\n")
            .map_err(|e| ContractError::sink_write(&name, e.to_string()))
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        let name = self.name.clone();
        self.writer()?
            .flush()
            .map_err(|e| ContractError::sink_write(&name, e.to_string()))
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        }
        debug!(sink = %self.name, path = %self.config.path.display(), "FileSink closed");
        Ok(())
    }
}
