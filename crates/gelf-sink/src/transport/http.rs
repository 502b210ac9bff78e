// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::{Transport, TransportMode};
use crate::buffer::FrameBuffer;
use crate::constants::{DEFAULT_BUFFER_SIZE, DEFAULT_BUFFER_TIME};
use crate::errors::TransportError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::error;

/// GELF over HTTP. Batches like a real HTTP transport would, but delivery is not
/// implemented: every send fails and the batch is left untouched.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    endpoint: String,
    buffer_size: usize,
    buffer_time: Duration,
}

impl HttpTransport {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            buffer_time: DEFAULT_BUFFER_TIME,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Http
    }

    fn buffer_size(&self) -> Option<usize> {
        Some(self.buffer_size)
    }

    fn buffer_time(&self) -> Duration {
        self.buffer_time
    }

    async fn send_buffer(&self, batch: &mut FrameBuffer) -> Result<(), TransportError> {
        error!(
            "Cannot send {} frames to {}: HTTP transport is not implemented",
            batch.len(),
            self.endpoint
        );
        Err(TransportError::NotImplemented(TransportMode::Http))
    }
}
