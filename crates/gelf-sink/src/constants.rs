// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Capacity of the ingestion queue; writers block once it is full.
pub const QUEUE_CAPACITY: usize = 500;

/// Byte threshold for buffering transports (flush once exceeded).
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;
/// Interval of the periodic flush for buffering transports.
pub const DEFAULT_BUFFER_TIME: Duration = Duration::from_secs(30);

// UDP chunking. The datagram budget stays under a typical path MTU.
pub const DATAGRAM_SIZE: usize = 1420;
pub const CHUNK_HEADER_SIZE: usize = 12;
pub const MAX_CHUNK_PAYLOAD: usize = DATAGRAM_SIZE - CHUNK_HEADER_SIZE;
pub const MAX_CHUNKS: usize = 128;
pub const CHUNK_MAGIC: [u8; 2] = [0x1e, 0x0f];

pub const GELF_VERSION: &str = "1.1";
pub const DEFAULT_GELF_PORT: u16 = 12201;

// Field names of incoming records.
pub const SOURCE_LEVEL_FIELD: &str = "level";
pub const SOURCE_TIME_FIELD: &str = "time";
pub const SOURCE_MESSAGE_FIELD: &str = "message";
pub const SOURCE_CALLER_FIELD: &str = "caller";
pub const SOURCE_ERROR_FIELD: &str = "error";
pub const SOURCE_STACK_FIELD: &str = "stack";

// Field names of outgoing GELF frames.
pub const VERSION_FIELD: &str = "version";
pub const HOST_FIELD: &str = "host";
pub const SHORT_MESSAGE_FIELD: &str = "short_message";
pub const TIMESTAMP_FIELD: &str = "timestamp";
pub const LEVEL_FIELD: &str = "level";
pub const ORIGINAL_LEVEL_FIELD: &str = "_o_level";
pub const FILE_FIELD: &str = "_file";
pub const LINE_FIELD: &str = "_line";
pub const ERROR_FIELD: &str = "_err";
pub const ERROR_STACK_FIELD: &str = "_err_stack";
/// GELF reserves `_id`; events carrying it are dropped.
pub const RESERVED_ID_FIELD: &str = "_id";

// Timestamp encodings of incoming records.
pub const TIME_FORMAT_UNIX: &str = "";
pub const TIME_FORMAT_UNIX_MS: &str = "UNIXMS";
pub const TIME_FORMAT_UNIX_MICRO: &str = "UNIXMICRO";
