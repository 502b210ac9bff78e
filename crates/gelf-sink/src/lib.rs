// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! GELF log sink.
//!
//! Accepts JSON-encoded log events, reshapes them into GELF 1.1 frames, batches them in a
//! [`buffer::FrameBuffer`] and ships them through a [`transport::Transport`]. The UDP
//! transport fragments frames larger than one datagram using the GELF chunking protocol.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod buffer;
pub mod config;
pub mod constants;
pub mod errors;
pub mod gelf;
pub mod sink;
pub mod spool;
pub mod task_group;
pub mod transport;

/// A decoded log record: field name to dynamically typed value.
pub type Event = serde_json::Map<String, serde_json::Value>;
