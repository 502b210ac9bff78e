// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::errors::BufferError;
use std::collections::VecDeque;

/// One GELF-encoded event. Never mutated once buffered.
pub type Frame = Vec<u8>;

/// FIFO of serialized frames with a running byte count.
///
/// The buffer does no locking of its own. Owners that share it between producers and a
/// flusher keep it behind a mutex and use [`FrameBuffer::take`] so the swap happens in a
/// single critical section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameBuffer {
    frames: VecDeque<Frame>,
    size: usize,
}

impl FrameBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, frame: Frame) {
        self.size += frame.len();
        self.frames.push_back(frame);
    }

    /// Removes and returns the oldest frame.
    pub fn pull(&mut self) -> Result<Frame, BufferError> {
        let frame = self.frames.pop_front().ok_or(BufferError::Empty)?;
        self.size -= frame.len();
        Ok(frame)
    }

    /// Deep copy, independent from `self` from here on.
    #[must_use]
    pub fn copy(&self) -> Self {
        self.clone()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.size = 0;
    }

    /// Copy followed by clear, as one operation: hands back the contents and leaves the
    /// buffer empty.
    #[must_use]
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Total bytes of all buffered frames.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FromIterator<Frame> for FrameBuffer {
    fn from_iter<I: IntoIterator<Item = Frame>>(iter: I) -> Self {
        let mut buffer = FrameBuffer::new();
        for frame in iter {
            buffer.add(frame);
        }
        buffer
    }
}
