// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::{Transport, TransportMode};
use crate::buffer::FrameBuffer;
use crate::constants::{DEFAULT_BUFFER_SIZE, DEFAULT_BUFFER_TIME};
use crate::errors::TransportError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::error;

/// GELF over TCP. Addressable like the other transports; delivery is not implemented.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    endpoint: String,
}

impl TcpTransport {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Tcp
    }

    fn buffer_size(&self) -> Option<usize> {
        Some(DEFAULT_BUFFER_SIZE)
    }

    fn buffer_time(&self) -> Duration {
        DEFAULT_BUFFER_TIME
    }

    async fn send_buffer(&self, batch: &mut FrameBuffer) -> Result<(), TransportError> {
        error!(
            "Cannot send {} frames to {}: TCP transport is not implemented",
            batch.len(),
            self.endpoint
        );
        Err(TransportError::NotImplemented(TransportMode::Tcp))
    }
}
