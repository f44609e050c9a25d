/*
 * exchange.rs
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

//! One request/response hop over an already-opened transport.
//!
//! The response side walks a fixed sequence:
//! Header, then either Body (fixed length) or the chunked cycle
//! ChunkedLength -> ChunkedBody -> ChunkBodyTail -> ChunkedLength, ending
//! when the zero-length terminator chunk arrives. Each step issues exactly
//! one transport read. Redirect statuses return to the caller, which owns
//! the hop budget and the secure-upgrade handoff; this module never follows
//! a redirect itself.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::cookie::CookieStore;
use crate::error::HttpError;
use crate::request::RequestTemplate;
use crate::response::{BodyFraming, Response, ResponseHead};
use crate::transport::{ReadMode, StreamTransport, CRLF, CRLF_CRLF};
use crate::url::HttpUrl;

/// Result of one hop: a finished response, or a redirect to chase.
#[derive(Debug)]
pub enum HopOutcome {
    Done(Response),
    /// 301-308 with the resolved target. A missing Location resolves to
    /// the current URL again; the caller's hop budget bounds that.
    Redirect(HttpUrl),
}

/// Serialize the request for `url`, send it, and read one full response.
/// The transport must be freshly connected; it is left drained but open,
/// and the caller closes it on every path.
pub async fn run_hop<S>(
    transport: &mut StreamTransport<S>,
    template: &RequestTemplate,
    url: &HttpUrl,
    cookies: &dyn CookieStore,
) -> Result<HopOutcome, HttpError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    transport.queue_write(template.serialize(url, cookies));
    transport.flush().await?;

    // Header
    let head_bytes = transport.read(ReadMode::Delimiter(CRLF_CRLF)).await?;
    let (head, set_cookies) = ResponseHead::parse(&head_bytes)?;
    if !set_cookies.is_empty() {
        cookies.receive(&set_cookies, url);
    }

    if head.is_redirect() {
        let target = match head.header("Location") {
            Some(location) => url
                .resolve(location)
                .map_err(|_| HttpError::MalformedResponse(format!("bad Location: {:?}", location)))?,
            None => url.clone(),
        };
        return Ok(HopOutcome::Redirect(target));
    }

    match head.body_framing()? {
        BodyFraming::FixedLength(len) => {
            // Body
            let body = transport.read(ReadMode::ExactLength(len)).await?;
            Ok(HopOutcome::Done(Response::new(head, body)))
        }
        BodyFraming::Chunked => {
            let body = read_chunked_body(transport).await?;
            Ok(HopOutcome::Done(Response::new(head, body)))
        }
    }
}

/// Chunked cycle: size line, chunk bytes, CRLF tail, repeat until the
/// zero-length terminator. The accumulator exists only for the duration of
/// a chunked body.
async fn read_chunked_body<S>(
    transport: &mut StreamTransport<S>,
) -> Result<Bytes, HttpError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut accumulator = BytesMut::new();
    loop {
        // ChunkedLength
        let line = transport.read(ReadMode::Delimiter(CRLF)).await?;
        let size = parse_chunk_size(&line)?;
        if size == 0 {
            return Ok(accumulator.freeze());
        }
        // ChunkedBody
        let chunk = transport.read(ReadMode::ExactLength(size)).await?;
        accumulator.extend_from_slice(&chunk);
        // ChunkBodyTail: the mandatory CRLF after the chunk bytes.
        transport.read(ReadMode::Delimiter(CRLF)).await?;
    }
}

/// Parse a chunk-size line (hex, optional `;extension` ignored).
fn parse_chunk_size(line: &[u8]) -> Result<usize, HttpError> {
    let text = std::str::from_utf8(line)
        .map_err(|_| HttpError::IllegalChunkLength(format!("{:?}", line)))?;
    let token = text
        .trim_end_matches(|c| c == '\r' || c == '\n')
        .split(';')
        .next()
        .unwrap_or("")
        .trim();
    usize::from_str_radix(token, 16)
        .map_err(|_| HttpError::IllegalChunkLength(token.to_string()))
}
