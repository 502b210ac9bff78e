// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Ingestion pipeline.
//!
//! ```text
//! write() -> [bounded queue] -> dispatcher -> transform task (one per event)
//!                                                  |
//!                                     GelfMapper -> FrameBuffer::add
//!                                                  |
//!                        size trigger (async flush) | ticker (blocking flush)
//!                                                  |
//!                                  take snapshot -> Transport::send_buffer
//! ```
//!
//! The frame buffer is owned by the pipeline. Producers only reach it through transform
//! tasks, and flushes swap it out in one critical section so sends never contend with
//! new frames.

use crate::buffer::FrameBuffer;
use crate::config::SinkConfig;
use crate::constants::SOURCE_MESSAGE_FIELD;
use crate::errors::{SinkError, TransportError};
use crate::gelf::GelfMapper;
use crate::spool::TempLogSpool;
use crate::task_group::{Generations, TaskGuard};
use crate::transport::{self, Transport};
use crate::Event;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Running,
    Closing,
    Closed,
}

// Each queued event holds a guard of the current transform generation, so blocking
// flushes also wait for events accepted earlier but still in the queue.
type Queued = (Event, TaskGuard);

struct Ingress {
    state: SinkState,
    queue: Option<mpsc::Sender<Queued>>,
    dispatcher: Option<JoinHandle<()>>,
    // Cancels the periodic flush when dropped.
    ticker: Option<DropGuard>,
}

struct Pipeline {
    mapper: GelfMapper,
    transport: Arc<dyn Transport>,
    spool: TempLogSpool,
    buffer: Mutex<FrameBuffer>,
    transforms: Generations,
    sends: Generations,
    // Serializes blocking flushes.
    flushing: tokio::sync::Mutex<()>,
}

/// Handle to a running GELF sink. Clones share the same pipeline.
#[derive(Clone)]
pub struct GelfSink {
    ingress: Arc<Mutex<Ingress>>,
    pipeline: Arc<Pipeline>,
    flush_interval: Option<Arc<watch::Sender<Duration>>>,
}

impl GelfSink {
    /// Starts the pipeline on the current tokio runtime.
    pub fn new(config: &SinkConfig, transport: Arc<dyn Transport>) -> Result<Self, SinkError> {
        config.validate()?;

        let pipeline = Arc::new(Pipeline {
            mapper: GelfMapper::new(config.host.clone(), config.time_format.clone()),
            transport: Arc::clone(&transport),
            spool: TempLogSpool::new(config.temp_log_path.clone()),
            buffer: Mutex::new(FrameBuffer::new()),
            transforms: Generations::new(),
            sends: Generations::new(),
            flushing: tokio::sync::Mutex::new(()),
        });

        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);
        let dispatcher = tokio::spawn(Arc::clone(&pipeline).dispatch(queue_rx));

        let (flush_interval, ticker) = if transport.buffer_time().is_zero() {
            debug!(
                "{} transport does not buffer, periodic flush disabled",
                transport.mode()
            );
            (None, None)
        } else {
            let period = config
                .flush_interval
                .unwrap_or_else(|| transport.buffer_time());
            let (interval_tx, interval_rx) = watch::channel(period);
            let cancel_token = CancellationToken::new();
            tokio::spawn(Arc::clone(&pipeline).tick(interval_rx, cancel_token.clone()));
            (Some(Arc::new(interval_tx)), Some(cancel_token.drop_guard()))
        };

        debug!(
            "GELF sink started with {} transport, queue capacity {}",
            transport.mode(),
            config.queue_capacity
        );

        Ok(Self {
            ingress: Arc::new(Mutex::new(Ingress {
                state: SinkState::Running,
                queue: Some(queue_tx),
                dispatcher: Some(dispatcher),
                ticker,
            })),
            pipeline,
            flush_interval,
        })
    }

    /// Builds the configured transport and starts the pipeline.
    pub async fn connect(config: &SinkConfig) -> Result<Self, SinkError> {
        let transport = transport::connect(config).await?;
        Self::new(config, transport)
    }

    /// Decodes one JSON record and queues it, waiting while the queue is full.
    ///
    /// Records without a message are accepted but discarded. Returns the number of bytes
    /// consumed, which is always the whole record.
    pub async fn write(&self, record: &[u8]) -> Result<usize, SinkError> {
        let queue = self.queue()?;
        if let Some(event) = decode(record)? {
            queue
                .send((event, self.pipeline.transforms.track()))
                .await
                .map_err(|_| SinkError::PipelineClosed)?;
        }
        Ok(record.len())
    }

    /// Like [`GelfSink::write`], blocking the current thread while the queue is full.
    /// Must not be called from within an asynchronous context.
    pub fn blocking_write(&self, record: &[u8]) -> Result<usize, SinkError> {
        let queue = self.queue()?;
        if let Some(event) = decode(record)? {
            queue
                .blocking_send((event, self.pipeline.transforms.track()))
                .map_err(|_| SinkError::PipelineClosed)?;
        }
        Ok(record.len())
    }

    /// Hands the buffered frames to the transport.
    ///
    /// A blocking flush first waits for every event accepted before the call and for
    /// in-flight sends, then sends on the caller's task and reports the result. A
    /// non-blocking flush sends on a background task and always returns `Ok`. Nothing
    /// happens if the buffer is empty.
    pub async fn flush(&self, blocking: bool) -> Result<(), TransportError> {
        if blocking {
            self.pipeline.flush_blocking().await
        } else {
            self.pipeline.flush_async();
            Ok(())
        }
    }

    /// Changes the periodic flush interval. Ignored for transports that do not buffer.
    pub fn set_max_buffer_time(&self, interval: Duration) {
        if interval.is_zero() {
            warn!("Ignoring zero flush interval");
            return;
        }
        match &self.flush_interval {
            Some(flush_interval) => {
                flush_interval.send_replace(interval);
            }
            None => debug!(
                "{} transport does not buffer, ignoring flush interval",
                self.pipeline.transport.mode()
            ),
        }
    }

    /// Stops accepting writes, drains the queue, waits for every transform and performs a
    /// final blocking flush whose result is returned. Later calls do nothing.
    pub async fn close(&self) -> Result<(), SinkError> {
        let (dispatcher, ticker) = {
            let mut ingress = self.lock_ingress();
            if ingress.state != SinkState::Running {
                debug!("GELF sink already closed");
                return Ok(());
            }
            ingress.state = SinkState::Closing;
            // Dropping the last sender lets the dispatcher drain the queue and stop.
            ingress.queue = None;
            (ingress.dispatcher.take(), ingress.ticker.take())
        };
        drop(ticker);

        if let Some(dispatcher) = dispatcher {
            if let Err(e) = dispatcher.await {
                error!("GELF dispatcher failed: {}", e);
            }
        }
        let result = self.pipeline.flush_blocking().await;

        self.lock_ingress().state = SinkState::Closed;
        debug!("GELF sink closed");
        result.map_err(SinkError::from)
    }

    pub fn state(&self) -> SinkState {
        self.lock_ingress().state
    }

    /// Bytes currently buffered and not yet handed to the transport.
    pub fn buffered_bytes(&self) -> usize {
        self.pipeline.lock_buffer().size()
    }

    fn queue(&self) -> Result<mpsc::Sender<Queued>, SinkError> {
        let ingress = self.lock_ingress();
        match (&ingress.state, &ingress.queue) {
            (SinkState::Running, Some(queue)) => Ok(queue.clone()),
            _ => Err(SinkError::PipelineClosed),
        }
    }

    #[allow(clippy::expect_used)]
    fn lock_ingress(&self) -> MutexGuard<'_, Ingress> {
        self.ingress.lock().expect("lock poisoned")
    }
}

/// Decodes a record. `None` for records without a usable message.
fn decode(record: &[u8]) -> Result<Option<Event>, SinkError> {
    let event: Event = serde_json::from_slice(record)?;
    match event.get(SOURCE_MESSAGE_FIELD) {
        None | Some(Value::Null) => {
            trace!("Discarding event without message");
            Ok(None)
        }
        Some(Value::String(message)) if message.is_empty() => {
            trace!("Discarding event with empty message");
            Ok(None)
        }
        Some(_) => Ok(Some(event)),
    }
}

impl Pipeline {
    async fn dispatch(self: Arc<Self>, mut queue: mpsc::Receiver<Queued>) {
        debug!("GELF dispatcher started");
        while let Some((event, pending)) = queue.recv().await {
            let pipeline = Arc::clone(&self);
            tokio::spawn(async move {
                let _pending = pending;
                pipeline.process(event)
            });
        }
        debug!("GELF dispatcher stopped");
    }

    fn process(self: &Arc<Self>, event: Event) {
        let gelf = match self.mapper.map(event) {
            Ok(gelf) => gelf,
            Err(e) => {
                debug!("Dropping event: {}", e);
                return;
            }
        };
        let frame = match serde_json::to_vec(&gelf) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Error serializing GELF frame: {}", e);
                return;
            }
        };

        let size = {
            let mut buffer = self.lock_buffer();
            buffer.add(frame);
            buffer.size()
        };
        let exceeded = self
            .transport
            .buffer_size()
            .map_or(true, |limit| size > limit);
        if exceeded {
            self.flush_async();
        }
    }

    fn flush_async(self: &Arc<Self>) {
        let Some(batch) = self.take_snapshot() else {
            return;
        };
        let pipeline = Arc::clone(self);
        self.sends.spawn(async move {
            // failures are logged and spooled by ship
            let _ = pipeline.ship(batch).await;
        });
    }

    async fn flush_blocking(&self) -> Result<(), TransportError> {
        let _flushing = self.flushing.lock().await;
        // events accepted after this point belong to the next flush
        self.transforms.seal().wait().await;
        self.sends.seal().wait().await;
        match self.take_snapshot() {
            Some(batch) => self.ship(batch).await,
            None => Ok(()),
        }
    }

    fn take_snapshot(&self) -> Option<FrameBuffer> {
        let mut buffer = self.lock_buffer();
        (!buffer.is_empty()).then(|| buffer.take())
    }

    async fn ship(&self, mut batch: FrameBuffer) -> Result<(), TransportError> {
        let frames = batch.len();
        match self.transport.send_buffer(&mut batch).await {
            Ok(()) => {
                trace!("Sent {} GELF frames", frames);
                match self.spool.replay(self.transport.as_ref()).await {
                    Ok(0) => {}
                    Ok(replayed) => debug!("Replayed {} temporary log files", replayed),
                    Err(e) => error!("Error replaying temporary logs: {}", e),
                }
                Ok(())
            }
            Err(e) => {
                error!("Error sending {} GELF frames: {}", frames, e);
                if let Err(persist_error) = self.spool.persist(&mut batch).await {
                    error!("Error persisting unsent frames: {}", persist_error);
                }
                Err(e)
            }
        }
    }

    async fn tick(
        self: Arc<Self>,
        mut flush_interval: watch::Receiver<Duration>,
        cancel_token: CancellationToken,
    ) {
        let mut ticker = periodic(*flush_interval.borrow_and_update());
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                _ = ticker.tick() => {
                    // failures are logged and spooled by ship
                    let _ = self.flush_blocking().await;
                }
                changed = flush_interval.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let period = *flush_interval.borrow_and_update();
                    debug!("Flush interval set to {:?}", period);
                    ticker = periodic(period);
                }
            }
        }
        debug!("Periodic flush stopped");
    }

    #[allow(clippy::expect_used)]
    fn lock_buffer(&self) -> MutexGuard<'_, FrameBuffer> {
        self.buffer.lock().expect("lock poisoned")
    }
}

fn periodic(period: Duration) -> Interval {
    // first tick one period from now, not immediately
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
