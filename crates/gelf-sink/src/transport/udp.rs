// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! GELF over UDP.
//!
//! Frames that fit in [`MAX_CHUNK_PAYLOAD`] bytes go out as one plain datagram. Larger
//! frames are split into at most [`MAX_CHUNKS`] chunks, each prefixed by a 12-byte header:
//!
//! ```text
//! [0x1e 0x0f][8-byte message id][sequence index][sequence count][payload]
//! ```

use super::{Transport, TransportMode};
use crate::buffer::FrameBuffer;
use crate::constants::{CHUNK_HEADER_SIZE, CHUNK_MAGIC, MAX_CHUNKS, MAX_CHUNK_PAYLOAD};
use crate::errors::TransportError;
use async_trait::async_trait;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, trace, warn};

/// Header shared by every chunk of one fragmented frame. Only the sequence index
/// differs between chunks and it is written at encode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    message_id: [u8; 8],
    count: u8,
}

impl ChunkHeader {
    pub fn new(message_id: [u8; 8], count: u8) -> Self {
        Self { message_id, count }
    }

    /// Header with a fresh random message id.
    pub fn random(count: u8) -> Self {
        Self::new(rand::random(), count)
    }

    pub fn message_id(&self) -> [u8; 8] {
        self.message_id
    }

    pub fn count(&self) -> u8 {
        self.count
    }

    pub fn encode(&self, sequence: u8) -> [u8; CHUNK_HEADER_SIZE] {
        let mut header = [0u8; CHUNK_HEADER_SIZE];
        header[..2].copy_from_slice(&CHUNK_MAGIC);
        header[2..10].copy_from_slice(&self.message_id);
        header[10] = sequence;
        header[11] = self.count;
        header
    }
}

/// Iterator over the datagrams of one fragmented frame.
pub struct Chunks<'a> {
    header: ChunkHeader,
    payloads: std::iter::Enumerate<std::slice::Chunks<'a, u8>>,
}

impl<'a> Chunks<'a> {
    /// Fails with `FrameTooLarge` if the frame needs more than [`MAX_CHUNKS`] chunks.
    pub fn new(frame: &'a [u8]) -> Result<Self, TransportError> {
        let chunks = frame.len().div_ceil(MAX_CHUNK_PAYLOAD);
        if chunks > MAX_CHUNKS {
            return Err(TransportError::FrameTooLarge { chunks });
        }
        // MAX_CHUNKS fits in a u8
        let count = u8::try_from(chunks).map_err(|_| TransportError::FrameTooLarge { chunks })?;
        Ok(Self {
            header: ChunkHeader::random(count),
            payloads: frame.chunks(MAX_CHUNK_PAYLOAD).enumerate(),
        })
    }

    pub fn header(&self) -> ChunkHeader {
        self.header
    }
}

impl Iterator for Chunks<'_> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        let (sequence, payload) = self.payloads.next()?;
        let mut datagram = Vec::with_capacity(CHUNK_HEADER_SIZE + payload.len());
        // sequence < count <= MAX_CHUNKS
        datagram.extend_from_slice(&self.header.encode(sequence as u8));
        datagram.extend_from_slice(payload);
        Some(datagram)
    }
}

/// Connectionless GELF transport. Does not buffer: every frame is flushed as soon as it
/// is added, so there is no periodic timer either.
#[derive(Debug, Clone)]
pub struct UdpTransport {
    server_addr: SocketAddr,
}

impl UdpTransport {
    /// Resolves `endpoint` (`host:port`) once.
    pub async fn new(endpoint: &str) -> Result<Self, TransportError> {
        let server_addr = tokio::net::lookup_host(endpoint)
            .await
            .map_err(|_| TransportError::Resolve(endpoint.to_string()))?
            .next()
            .ok_or_else(|| TransportError::Resolve(endpoint.to_string()))?;
        Ok(Self { server_addr })
    }

    fn local_addr(&self) -> SocketAddr {
        match self.server_addr {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        }
    }

    async fn send_chunked(&self, socket: &UdpSocket, frame: &[u8]) -> Result<(), TransportError> {
        let chunks = Chunks::new(frame)?;
        let count = chunks.header().count();
        trace!("Sending frame of {} bytes in {} chunks", frame.len(), count);
        for (sequence, datagram) in chunks.enumerate() {
            // A lost chunk leaves an incomplete message at the collector; the rest of the
            // batch is still sent.
            if let Err(e) = socket.send(&datagram).await {
                warn!("Error sending chunk {}/{}: {}", sequence + 1, count, e);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for UdpTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Udp
    }

    fn buffer_size(&self) -> Option<usize> {
        None
    }

    fn buffer_time(&self) -> Duration {
        Duration::ZERO
    }

    async fn send_buffer(&self, batch: &mut FrameBuffer) -> Result<(), TransportError> {
        let socket = UdpSocket::bind(self.local_addr()).await?;
        socket.connect(self.server_addr).await?;
        debug!("Sending {} frames to {}", batch.len(), self.server_addr);

        while let Ok(frame) = batch.pull() {
            if frame.len() <= MAX_CHUNK_PAYLOAD {
                socket.send(&frame).await?;
            } else {
                self.send_chunked(&socket, &frame).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};
    use tracing_test::traced_test;

    fn frame_of(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    async fn receiver() -> (UdpSocket, UdpTransport) {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let transport = UdpTransport::new(&server.local_addr().unwrap().to_string())
            .await
            .unwrap();
        (server, transport)
    }

    async fn recv_all(server: &UdpSocket) -> Vec<Vec<u8>> {
        let mut datagrams = Vec::new();
        let mut buf = vec![0u8; 65536];
        while let Ok(Ok(len)) = timeout(Duration::from_millis(200), server.recv(&mut buf)).await {
            datagrams.push(buf[..len].to_vec());
        }
        datagrams
    }

    #[test]
    fn test_chunk_header_layout() {
        let header = ChunkHeader::new([1, 2, 3, 4, 5, 6, 7, 8], 5);
        assert_eq!(
            header.encode(3),
            [0x1e_u8, 0x0f, 1, 2, 3, 4, 5, 6, 7, 8, 3, 5]
        );
        // template is untouched by encoding
        assert_eq!(header.encode(0)[10], 0);
    }

    #[test]
    fn test_chunks_reassemble_frame() {
        let frame = frame_of(MAX_CHUNK_PAYLOAD * 2 + 17);
        let datagrams: Vec<_> = Chunks::new(&frame).unwrap().collect();

        assert_eq!(datagrams.len(), 3);
        let message_id = &datagrams[0][2..10];
        let mut reassembled = Vec::new();
        for (i, datagram) in datagrams.iter().enumerate() {
            assert!(datagram.len() <= CHUNK_HEADER_SIZE + MAX_CHUNK_PAYLOAD);
            assert_eq!(&datagram[..2], &CHUNK_MAGIC);
            assert_eq!(&datagram[2..10], message_id);
            assert_eq!(datagram[10] as usize, i);
            assert_eq!(datagram[11], 3);
            reassembled.extend_from_slice(&datagram[CHUNK_HEADER_SIZE..]);
        }
        assert_eq!(reassembled, frame);
    }

    #[test]
    fn test_chunk_count_exact_multiple() {
        let frame = frame_of(MAX_CHUNK_PAYLOAD * 2);
        let chunks = Chunks::new(&frame).unwrap();
        assert_eq!(chunks.header().count(), 2);
        assert_eq!(chunks.count(), 2);
    }

    #[test]
    fn test_chunk_limit_boundary() {
        let frame = frame_of(MAX_CHUNK_PAYLOAD * MAX_CHUNKS);
        assert_eq!(Chunks::new(&frame).unwrap().count(), MAX_CHUNKS);

        let frame = frame_of(MAX_CHUNK_PAYLOAD * MAX_CHUNKS + 1);
        assert!(matches!(
            Chunks::new(&frame),
            Err(TransportError::FrameTooLarge { chunks: 129 })
        ));
    }

    #[test]
    fn test_message_ids_differ_per_frame() {
        let frame = frame_of(MAX_CHUNK_PAYLOAD + 1);
        let first = Chunks::new(&frame).unwrap().header().message_id();
        let second = Chunks::new(&frame).unwrap().header().message_id();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_small_frame_is_sent_unmodified() {
        let (server, transport) = receiver().await;
        let frame = br#"{"short_message":"hello"}"#.to_vec();
        let mut batch: FrameBuffer = vec![frame.clone()].into_iter().collect();

        transport.send_buffer(&mut batch).await.unwrap();

        assert_eq!(recv_all(&server).await, vec![frame]);
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_frame_at_payload_limit_is_not_chunked() {
        let (server, transport) = receiver().await;
        let frame = frame_of(MAX_CHUNK_PAYLOAD);
        let mut batch: FrameBuffer = vec![frame.clone()].into_iter().collect();

        transport.send_buffer(&mut batch).await.unwrap();

        assert_eq!(recv_all(&server).await, vec![frame]);
    }

    #[tokio::test]
    async fn test_large_frame_is_chunked() {
        let (server, transport) = receiver().await;
        let frame = frame_of(MAX_CHUNK_PAYLOAD * 3 + 100);
        let mut batch: FrameBuffer = vec![frame.clone()].into_iter().collect();

        transport.send_buffer(&mut batch).await.unwrap();

        let mut datagrams = recv_all(&server).await;
        assert_eq!(datagrams.len(), 4);
        datagrams.sort_by_key(|d| d[10]);
        let reassembled: Vec<u8> = datagrams
            .iter()
            .flat_map(|d| d[CHUNK_HEADER_SIZE..].to_vec())
            .collect();
        assert_eq!(reassembled, frame);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failed_chunk_is_logged_and_skipped() {
        let (_server, transport) = receiver().await;
        // never connected, so every send fails
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let frame = frame_of(MAX_CHUNK_PAYLOAD * 2 + 1);

        transport.send_chunked(&socket, &frame).await.unwrap();

        assert!(logs_contain("Error sending chunk 1/3"));
        assert!(logs_contain("Error sending chunk 3/3"));
    }

    #[tokio::test]
    async fn test_too_large_frame_aborts_batch() {
        let (server, transport) = receiver().await;
        let mut batch: FrameBuffer = vec![
            frame_of(MAX_CHUNK_PAYLOAD * MAX_CHUNKS + 1),
            b"after".to_vec(),
        ]
        .into_iter()
        .collect();

        let result = transport.send_buffer(&mut batch).await;

        assert!(matches!(
            result,
            Err(TransportError::FrameTooLarge { chunks: 129 })
        ));
        assert!(recv_all(&server).await.is_empty());
        // the frame behind the oversized one was never pulled
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn test_unresolvable_endpoint() {
        let result = UdpTransport::new("not an endpoint").await;
        assert!(matches!(result, Err(TransportError::Resolve(_))));
    }
}
