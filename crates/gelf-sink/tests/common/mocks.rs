// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock transports for testing

use async_trait::async_trait;
use gelf_sink::buffer::FrameBuffer;
use gelf_sink::errors::TransportError;
use gelf_sink::transport::{Transport, TransportMode};
use serde_json::Value;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Transport that records every batch it is handed
#[allow(dead_code)]
pub struct RecordingTransport {
    buffer_size: Option<usize>,
    buffer_time: Duration,
    fail: AtomicBool,
    batches: Mutex<Vec<Vec<Vec<u8>>>>,
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn new(buffer_size: Option<usize>, buffer_time: Duration) -> Self {
        Self {
            buffer_size,
            buffer_time,
            fail: AtomicBool::new(false),
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Buffers up to `buffer_size` bytes and never flushes on a timer
    pub fn buffered(buffer_size: usize) -> Self {
        Self::new(Some(buffer_size), Duration::ZERO)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<Vec<Vec<u8>>> {
        self.batches.lock().unwrap().clone()
    }

    /// Every frame sent so far, decoded
    pub fn frames(&self) -> Vec<Value> {
        self.batches()
            .iter()
            .flatten()
            .map(|frame| serde_json::from_slice(frame).unwrap())
            .collect()
    }

    /// Polls until at least `count` frames were sent or `deadline` elapses
    pub async fn wait_for_frames(&self, count: usize, deadline: Duration) -> Vec<Value> {
        let start = Instant::now();
        loop {
            let frames = self.frames();
            if frames.len() >= count || start.elapsed() > deadline {
                return frames;
            }
            sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Tcp
    }

    fn buffer_size(&self) -> Option<usize> {
        self.buffer_size
    }

    fn buffer_time(&self) -> Duration {
        self.buffer_time
    }

    async fn send_buffer(&self, batch: &mut FrameBuffer) -> Result<(), TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Io(io::Error::other("collector unreachable")));
        }
        let mut frames = Vec::with_capacity(batch.len());
        while let Ok(frame) = batch.pull() {
            frames.push(frame);
        }
        self.batches.lock().unwrap().push(frames);
        Ok(())
    }
}
