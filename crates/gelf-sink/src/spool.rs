// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Temporary log files for frames whose send failed.
//!
//! Each failed batch is written, one frame per line, to a new `log_<unix-nanos>.log` in the
//! spool directory. After a later send succeeds the files are replayed oldest first and
//! removed once delivered. Frames the transport can never accept are discarded during
//! replay, and a file whose replay fails keeps only the frames that were not sent.

use crate::buffer::FrameBuffer;
use crate::errors::TransportError;
use crate::transport::Transport;
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

const TEMP_LOG_FILE_PATTERN: &str = r"^log_([0-9]+)\.log$";

#[derive(Debug)]
pub struct TempLogSpool {
    dir: Option<PathBuf>,
    file_pattern: Regex,
    replaying: Mutex<()>,
}

impl TempLogSpool {
    /// A spool without a directory is disabled: persisting drops the frames and replay
    /// has nothing to send.
    pub fn new(dir: Option<PathBuf>) -> Self {
        #[allow(clippy::expect_used)]
        let file_pattern = Regex::new(TEMP_LOG_FILE_PATTERN).expect("valid temp log pattern");
        Self {
            dir,
            file_pattern,
            replaying: Mutex::new(()),
        }
    }

    /// Writes every frame left in `batch` to a new temporary log file and empties it.
    /// Returns the path written, if any.
    pub async fn persist(&self, batch: &mut FrameBuffer) -> io::Result<Option<PathBuf>> {
        let Some(dir) = &self.dir else {
            return Ok(None);
        };
        if batch.is_empty() {
            return Ok(None);
        }

        fs::create_dir_all(dir).await?;
        let mut stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();
        let (path, mut file) = loop {
            let path = dir.join(format!("log_{stamp}.log"));
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => stamp += 1,
                Err(e) => return Err(e),
            }
        };

        file.write_all(&encode(batch)).await?;
        file.flush().await?;
        debug!("Persisted unsent frames to {}", path.display());
        Ok(Some(path))
    }

    /// Re-sends spooled files through `transport`, oldest first, stopping at the first
    /// failure. Returns the number of files delivered. Skipped if another replay is
    /// already running.
    pub async fn replay(&self, transport: &dyn Transport) -> io::Result<usize> {
        let Some(dir) = &self.dir else {
            return Ok(0);
        };
        let Ok(_replaying) = self.replaying.try_lock() else {
            debug!("Temporary log replay already running");
            return Ok(0);
        };

        let mut delivered = 0;
        for path in self.pending_files(dir).await? {
            let mut batch = decode(&fs::read(&path).await?);

            if let Err(e) = deliver(transport, &mut batch).await {
                warn!("Failed to replay {}: {}", path.display(), e);
                // keep only what was not sent
                fs::write(&path, encode(&mut batch)).await?;
                break;
            }
            if let Err(e) = fs::remove_file(&path).await {
                error!("Failed to remove replayed {}: {}", path.display(), e);
                break;
            }
            delivered += 1;
        }
        Ok(delivered)
    }

    /// Spool files in the order they were written.
    async fn pending_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(captures) = name.to_str().and_then(|n| self.file_pattern.captures(n)) else {
                continue;
            };
            if let Ok(stamp) = captures[1].parse::<u128>() {
                files.push((stamp, entry.path()));
            }
        }
        files.sort();
        Ok(files.into_iter().map(|(_, path)| path).collect())
    }
}

/// Sends `batch`, discarding frames the transport rejects as too large. Transient errors
/// stop delivery and leave the unsent frames in `batch`.
async fn deliver(
    transport: &dyn Transport,
    batch: &mut FrameBuffer,
) -> Result<(), TransportError> {
    loop {
        let before = batch.len();
        match transport.send_buffer(batch).await {
            Ok(()) => return Ok(()),
            Err(TransportError::FrameTooLarge { chunks }) => {
                warn!("Discarding spooled frame of {} chunks", chunks);
                // the oversized frame is normally pulled before the error
                if batch.len() == before {
                    let _ = batch.pull();
                }
                if batch.is_empty() {
                    return Ok(());
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// One frame per line.
fn encode(batch: &mut FrameBuffer) -> Vec<u8> {
    let mut contents = Vec::with_capacity(batch.size() + batch.len());
    while let Ok(frame) = batch.pull() {
        contents.extend_from_slice(&frame);
        contents.push(b'\n');
    }
    contents
}

fn decode(contents: &[u8]) -> FrameBuffer {
    contents
        .split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .map(<[u8]>::to_vec)
        .collect()
}
