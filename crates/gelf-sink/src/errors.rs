// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::transport::TransportMode;

/// Errors surfaced to producers and to whoever drives the sink's lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("cannot decode event: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("pipeline is closed")]
    PipelineClosed,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("no frame left in buffer")]
    Empty,
}

/// Errors raised while mapping an event onto GELF fields. Never reported to the producer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("key `id` is not allowed")]
    KeyNotAllowed,

    #[error("cannot convert to valid key: {0:?}")]
    InvalidKey(String),

    #[error("unsupported log level: {0}")]
    InvalidLevel(String),

    #[error("unknown time format: {0:?}")]
    UnknownTimeFormat(String),

    #[error("timestamp is not numeric")]
    InvalidTimestamp,

    #[error("cannot parse caller: {0}")]
    InvalidCaller(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("frame too large, exceeding maximum of 128 chunks: {chunks}")]
    FrameTooLarge { chunks: usize },

    #[error("cannot resolve address {0}")]
    Resolve(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0} transport is not implemented")]
    NotImplemented(TransportMode),
}
