//! NetworkSink - UDP fire-and-forget, one JSON datagram per command

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use contracts::ContractError;
use safety_gate::Command;
use tokio::net::UdpSocket;
use tracing::{debug, instrument, warn};

use crate::sink::CommandSink;

/// Largest UDP payload over IPv4
const MAX_DATAGRAM: usize = 65507;

/// Configuration for NetworkSink
#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    /// Target address
    pub addr: SocketAddr,
    /// Datagrams above this size are not sent
    pub max_packet_size: usize,
}

impl NetworkSinkConfig {
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let max_packet_size = params
            .get("max_packet_size")
            .and_then(|s| s.parse().ok())
            .unwrap_or(MAX_DATAGRAM)
            .min(MAX_DATAGRAM);

        Ok(Self {
            addr,
            max_packet_size,
        })
    }
}

/// Sink that sends commands over UDP
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    socket: Option<UdpSocket>,
}

impl NetworkSink {
    #[instrument(name = "network_sink_new", skip(name, config), fields(target = %config.addr))]
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let bind: SocketAddr = if config.addr.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(config.addr).await?;

        debug!(sink = %name, target = %config.addr, "NetworkSink connected");

        Ok(Self {
            name,
            config,
            socket: Some(socket),
        })
    }

    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = NetworkSinkConfig::from_params(params).map_err(|e| ContractError::sink_write(&name, e))?;

        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))
    }

    fn encode(&self, command: &Command) -> Result<Bytes, ContractError> {
        let data = serde_json::to_vec(command).map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        if data.len() > self.config.max_packet_size {
            warn!(
                sink = %self.name,
                size = data.len(),
                max = self.config.max_packet_size,
                "datagram too large, not sent"
            );
            return Err(ContractError::sink_write(&self.name, "datagram exceeds max_packet_size"));
        }
        Ok(Bytes::from(data))
    }
}

impl CommandSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_sink_send",
        skip(self, command),
        fields(sink = %self.name, command = %command.command_type())
    )]
    async fn send(&mut self, command: &Command) -> Result<(), ContractError> {
        let payload = self.encode(command)?;
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| ContractError::sink_write(&self.name, "socket not connected"))?;

        let sent = socket
            .send(&payload)
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        debug!(sink = %self.name, bytes = sent, "datagram sent");
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "network_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.socket = None;
        debug!(sink = %self.name, "NetworkSink closed");
        Ok(())
    }
}
