// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mapping of decoded log records onto GELF 1.1 fields.

use crate::constants::{
    ERROR_FIELD, ERROR_STACK_FIELD, FILE_FIELD, GELF_VERSION, HOST_FIELD, LEVEL_FIELD,
    LINE_FIELD, ORIGINAL_LEVEL_FIELD, RESERVED_ID_FIELD, SHORT_MESSAGE_FIELD,
    SOURCE_CALLER_FIELD, SOURCE_ERROR_FIELD, SOURCE_LEVEL_FIELD, SOURCE_MESSAGE_FIELD,
    SOURCE_STACK_FIELD, SOURCE_TIME_FIELD, TIMESTAMP_FIELD, TIME_FORMAT_UNIX,
    TIME_FORMAT_UNIX_MICRO, TIME_FORMAT_UNIX_MS, VERSION_FIELD,
};
use crate::errors::FieldError;
use crate::Event;
use serde_json::Value;
use tracing::trace;

/// Turns decoded records into GELF events stamped with a fixed host.
#[derive(Debug, Clone)]
pub struct GelfMapper {
    host: String,
    time_format: String,
}

impl GelfMapper {
    pub fn new(host: impl Into<String>, time_format: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            time_format: time_format.into(),
        }
    }

    /// Maps one record. An `Err` means the whole event must be dropped; field-level
    /// problems (bad timestamp, bad caller, unusable key) only omit that field.
    pub fn map(&self, event: Event) -> Result<Event, FieldError> {
        let mut gelf = Event::new();
        for (key, value) in event {
            match key.as_str() {
                SOURCE_LEVEL_FIELD => {
                    let level = value
                        .as_str()
                        .and_then(parse_level)
                        .ok_or_else(|| FieldError::InvalidLevel(value.to_string()))?;
                    gelf.insert(LEVEL_FIELD.to_string(), Value::from(level));
                    gelf.insert(ORIGINAL_LEVEL_FIELD.to_string(), value);
                }
                SOURCE_TIME_FIELD => match convert_time(&value, &self.time_format) {
                    Ok(timestamp) => {
                        gelf.insert(TIMESTAMP_FIELD.to_string(), Value::from(timestamp));
                    }
                    Err(e) => trace!("Omitting timestamp {}: {}", value, e),
                },
                SOURCE_MESSAGE_FIELD => {
                    gelf.insert(SHORT_MESSAGE_FIELD.to_string(), value);
                }
                SOURCE_CALLER_FIELD => {
                    match value.as_str().map(parse_caller) {
                        Some(Ok((file, line))) => {
                            gelf.insert(FILE_FIELD.to_string(), Value::from(file));
                            gelf.insert(LINE_FIELD.to_string(), Value::from(line));
                        }
                        Some(Err(e)) => trace!("Omitting caller: {}", e),
                        None => trace!("Omitting non-string caller {}", value),
                    }
                }
                SOURCE_ERROR_FIELD => {
                    gelf.insert(ERROR_FIELD.to_string(), value);
                }
                SOURCE_STACK_FIELD => {
                    gelf.insert(ERROR_STACK_FIELD.to_string(), value);
                }
                _ => match format_key(&key) {
                    Ok(formatted) => {
                        gelf.insert(formatted, value);
                    }
                    Err(FieldError::KeyNotAllowed) => return Err(FieldError::KeyNotAllowed),
                    Err(e) => trace!("Skipping field: {}", e),
                },
            }
        }
        gelf.insert(VERSION_FIELD.to_string(), Value::from(GELF_VERSION));
        gelf.insert(HOST_FIELD.to_string(), Value::from(self.host.as_str()));
        Ok(gelf)
    }
}

/// Converts an arbitrary field name into a GELF additional-field name.
///
/// The result:
/// - always starts with `_`
/// - keeps letters, digits, `_`, `-` and `.` and drops everything else
/// - turns camel case into snake case (`userId` becomes `_user_id`)
///
/// # Errors
///
/// * `FieldError::InvalidKey` - nothing usable is left of the name
/// * `FieldError::KeyNotAllowed` - the name maps onto the reserved `_id`
///
/// # Examples
///
/// ```
/// use gelf_sink::gelf::format_key;
///
/// assert_eq!(format_key("requestId").unwrap(), "_request_id");
/// assert_eq!(format_key("_already").unwrap(), "_already");
/// assert!(format_key("id").is_err());
/// ```
pub fn format_key(key: &str) -> Result<String, FieldError> {
    let mut formatted = String::with_capacity(key.len() + 1);
    for (i, c) in key.char_indices() {
        if i == 0 && c != '_' {
            formatted.push('_');
        }
        if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' {
            if c.is_uppercase() {
                if i > 0 {
                    formatted.push('_');
                }
                formatted.extend(c.to_lowercase());
            } else {
                formatted.push(c);
            }
        }
    }

    if formatted.is_empty() {
        return Err(FieldError::InvalidKey(key.to_string()));
    }
    if formatted == RESERVED_ID_FIELD {
        return Err(FieldError::KeyNotAllowed);
    }
    Ok(formatted)
}

/// Maps a source severity name onto a syslog level.
///
/// ```text
/// 0 Emergency  1 Alert  2 Critical  3 Error
/// 4 Warning    5 Notice 6 Informational 7 Debug
/// ```
///
/// Severities without a syslog counterpart (`trace`, empty, unknown) return `None`.
pub fn parse_level(level: &str) -> Option<u8> {
    match level {
        "debug" => Some(7),
        "info" => Some(6),
        "warn" => Some(4),
        "error" => Some(3),
        "fatal" => Some(2),
        "panic" => Some(1),
        _ => None,
    }
}

/// Converts a numeric record timestamp into GELF's fractional seconds.
pub fn convert_time(value: &Value, time_format: &str) -> Result<f64, FieldError> {
    let Value::Number(number) = value else {
        return Err(FieldError::InvalidTimestamp);
    };
    match time_format {
        TIME_FORMAT_UNIX => number.as_f64().ok_or(FieldError::InvalidTimestamp),
        TIME_FORMAT_UNIX_MS => number
            .as_f64()
            .map(|ms| ms / 1000.0)
            .ok_or(FieldError::InvalidTimestamp),
        // Microseconds are truncated to millisecond precision.
        TIME_FORMAT_UNIX_MICRO => number
            .as_i64()
            .map(|us| (us / 1000) as f64 / 1000.0)
            .ok_or(FieldError::InvalidTimestamp),
        other => Err(FieldError::UnknownTimeFormat(other.to_string())),
    }
}

/// Splits a `file:line` caller annotation.
pub fn parse_caller(caller: &str) -> Result<(String, i64), FieldError> {
    match caller.split(':').collect::<Vec<_>>().as_slice() {
        [file, line] => line
            .parse()
            .map(|line| (file.to_string(), line))
            .map_err(|_| FieldError::InvalidCaller(caller.to_string())),
        _ => Err(FieldError::InvalidCaller(caller.to_string())),
    }
}
