/*
 * error.rs
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

//! Operation errors. Every kind is terminal for the current operation;
//! there are no internal retries, and the transport is closed before any
//! of these is reported.

use std::fmt;
use std::io;

use crate::transport::TransportError;

/// Failure kinds for one logical HTTP operation.
#[derive(Debug)]
pub enum HttpError {
    /// The request URL could not be parsed.
    BadUrl(String),
    /// TCP connect (or TLS handshake in the secure delegate) failed.
    ConnectFailure(io::Error),
    /// Status line or header block could not be parsed.
    MalformedResponse(String),
    /// Response had neither Content-Length nor chunked Transfer-Encoding.
    MissingContentLength,
    /// A chunk-size line was not a hexadecimal integer.
    IllegalChunkLength(String),
    /// More than 10 redirect hops.
    RedirectLoopExceeded,
    /// The operation was cancelled by the caller.
    Cancelled,
    /// Mid-stream disconnect or I/O error.
    Transport(io::Error),
    /// Error surfaced verbatim from the secure-transport delegate path.
    UpstreamDelegate(String),
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpError::BadUrl(u) => write!(f, "bad URL: {}", u),
            HttpError::ConnectFailure(e) => write!(f, "connect failed: {}", e),
            HttpError::MalformedResponse(m) => write!(f, "malformed response: {}", m),
            HttpError::MissingContentLength => write!(f, "response has no Content-Length"),
            HttpError::IllegalChunkLength(l) => write!(f, "illegal chunk length: {:?}", l),
            HttpError::RedirectLoopExceeded => write!(f, "redirect limit exceeded"),
            HttpError::Cancelled => write!(f, "cancelled"),
            HttpError::Transport(e) => write!(f, "transport error: {}", e),
            HttpError::UpstreamDelegate(m) => write!(f, "secure delegate: {}", m),
        }
    }
}

impl std::error::Error for HttpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HttpError::ConnectFailure(e) | HttpError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for HttpError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Connect(e) => HttpError::ConnectFailure(e),
            TransportError::Io(e) => HttpError::Transport(e),
            TransportError::Closed => HttpError::Transport(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed",
            )),
        }
    }
}
