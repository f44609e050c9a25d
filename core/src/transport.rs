/*
 * transport.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Filodiretto, a raw-socket HTTP/1.1 fallback client.
 *
 * Filodiretto is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Filodiretto is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Filodiretto.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Stream transport: one duplex connection exposing exact-length and
//! delimiter-bounded reads plus queued writes.
//!
//! Reads are criterion-driven: the caller asks for `ExactLength(n)` or
//! `Delimiter(d)` and awaits exactly one buffer. Arrived bytes beyond the
//! satisfied criterion stay in the input buffer, drained strictly FIFO by
//! later reads. The `&mut self` read method makes "at most one pending
//! read per connection" structural rather than a runtime check.
//!
//! Writes go through a pending queue and are flushed with per-call written-
//! byte accounting: a short write leaves the unwritten remainder at the
//! front of the queue instead of assuming whole-buffer writes.

use std::collections::VecDeque;
use std::fmt;
use std::io;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

pub const CRLF: &[u8] = b"\r\n";
pub const CRLF_CRLF: &[u8] = b"\r\n\r\n";

/// Criterion for the single active read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Emit exactly `n` bytes once that many are buffered.
    ExactLength(usize),
    /// Emit everything through the end of the first occurrence of the
    /// delimiter, inclusive.
    Delimiter(&'static [u8]),
}

/// Transport-level failures, reported at most once per connection.
#[derive(Debug)]
pub enum TransportError {
    /// The connection could not be established.
    Connect(io::Error),
    /// An I/O error occurred after connect.
    Io(io::Error),
    /// The peer closed the stream while a read was outstanding.
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Connect(e) => write!(f, "connect: {}", e),
            TransportError::Io(e) => write!(f, "io: {}", e),
            TransportError::Closed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Connect(e) | TransportError::Io(e) => Some(e),
            TransportError::Closed => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        TransportError::Io(e)
    }
}

/// One duplex connection with an input buffer and a pending write queue.
/// Generic over the stream so the same transport drives plain TCP, TLS in
/// the secure delegate, and in-memory pipes in tests.
pub struct StreamTransport<S> {
    stream: S,
    read_buf: BytesMut,
    write_queue: VecDeque<Bytes>,
}

impl StreamTransport<TcpStream> {
    /// Open a plain TCP connection. No connect timeout is applied here;
    /// callers impose deadlines externally.
    pub async fn open(host: &str, port: u16) -> Result<Self, TransportError> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(TransportError::Connect)?;
        Ok(Self::new(stream))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> StreamTransport<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(4096),
            write_queue: VecDeque::new(),
        }
    }

    /// Append data to the pending write queue. Nothing is sent until
    /// `flush` is awaited.
    pub fn queue_write(&mut self, data: impl Into<Bytes>) {
        let data = data.into();
        if !data.is_empty() {
            self.write_queue.push_back(data);
        }
    }

    /// Drain the write queue. Each write call's return count is applied to
    /// the front buffer; a partial write keeps the remainder queued.
    pub async fn flush(&mut self) -> Result<(), TransportError> {
        while let Some(front) = self.write_queue.front_mut() {
            let n = self.stream.write(front).await?;
            if n == 0 {
                return Err(TransportError::Closed);
            }
            front.advance(n);
            if front.is_empty() {
                self.write_queue.pop_front();
            }
        }
        self.stream.flush().await?;
        Ok(())
    }

    /// Await one buffer satisfying the criterion. Bytes past the criterion
    /// remain buffered for the next read. End-of-stream or an I/O error
    /// while the read is outstanding is the error; a satisfied read is
    /// never also followed by one.
    pub async fn read(&mut self, mode: ReadMode) -> Result<Bytes, TransportError> {
        loop {
            if let Some(out) = self.try_satisfy(mode) {
                return Ok(out);
            }
            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(TransportError::Closed);
            }
        }
    }

    fn try_satisfy(&mut self, mode: ReadMode) -> Option<Bytes> {
        match mode {
            ReadMode::ExactLength(n) => {
                if self.read_buf.len() >= n {
                    Some(self.read_buf.split_to(n).freeze())
                } else {
                    None
                }
            }
            ReadMode::Delimiter(d) => find_subsequence(&self.read_buf, d)
                .map(|pos| self.read_buf.split_to(pos + d.len()).freeze()),
        }
    }

    /// Number of buffered-but-unread bytes.
    pub fn buffered(&self) -> usize {
        self.read_buf.len()
    }

    /// Tear down the connection, discarding buffered-but-unread data.
    pub async fn close(mut self) {
        let _ = self.stream.shutdown().await;
    }
}

/// First occurrence of `needle` in `haystack`. Delimiters bound small
/// control lines, so the rescan-per-arrival cost is acceptable.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
