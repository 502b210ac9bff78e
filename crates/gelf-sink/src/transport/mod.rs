// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Transports ship flushed batches to the collector.

use crate::buffer::FrameBuffer;
use crate::config::SinkConfig;
use crate::errors::TransportError;
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub mod http;
pub mod tcp;
pub mod udp;

pub use http::HttpTransport;
pub use tcp::TcpTransport;
pub use udp::UdpTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum TransportMode {
    #[display("http")]
    Http,
    #[display("tcp")]
    Tcp,
    #[display("udp")]
    Udp,
}

impl FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            other => Err(format!("unknown transport mode '{other}'")),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    fn mode(&self) -> TransportMode;

    /// Byte threshold that triggers a size-based flush. `None` means the transport does
    /// not buffer: every buffered frame is flushed right away.
    fn buffer_size(&self) -> Option<usize>;

    /// Interval of the periodic flush. Zero disables the timer.
    fn buffer_time(&self) -> Duration;

    /// Ships every frame of `batch`, pulling them as it goes. On error, the frames that
    /// were never pulled are still in `batch`.
    async fn send_buffer(&self, batch: &mut FrameBuffer) -> Result<(), TransportError>;
}

/// Builds the transport selected by `config`.
pub async fn connect(config: &SinkConfig) -> Result<Arc<dyn Transport>, TransportError> {
    let transport: Arc<dyn Transport> = match config.transport {
        TransportMode::Udp => Arc::new(UdpTransport::new(&config.endpoint).await?),
        TransportMode::Tcp => Arc::new(TcpTransport::new(&config.endpoint)),
        TransportMode::Http => Arc::new(HttpTransport::new(&config.endpoint)),
    };
    Ok(transport)
}
