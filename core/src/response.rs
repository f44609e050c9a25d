/*
 * response.rs
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

//! Response head parsing and the completed response.
//!
//! The header map is last-write-wins on duplicate names. Set-Cookie is
//! routed to the cookie store line by line before folding, so it survives;
//! repeats of any other header are silently dropped. Body framing is
//! decided exactly once per head and carried as a typed enum.

use bytes::Bytes;

use crate::error::HttpError;

/// Body framing mode, resolved once from the response head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    FixedLength(usize),
    Chunked,
}

/// Status line and folded header block of one response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: u16,
    /// Protocol version token from the status line (e.g. "HTTP/1.1").
    pub version: String,
    pub reason: Option<String>,
    headers: Vec<(String, String)>,
}

impl ResponseHead {
    /// Parse the bytes of a head (through the blank-line terminator).
    /// Returns the head plus the raw Set-Cookie values, which are excluded
    /// from the folded map.
    pub fn parse(data: &[u8]) -> Result<(ResponseHead, Vec<String>), HttpError> {
        let text = std::str::from_utf8(data)
            .map_err(|_| HttpError::MalformedResponse("head is not UTF-8".to_string()))?;
        let mut lines = text.split("\r\n");
        let status_line = lines.next().unwrap_or("");

        let mut tokens = status_line.splitn(3, ' ');
        let version = tokens.next().unwrap_or("").to_string();
        let status = tokens
            .next()
            .and_then(|s| s.parse::<u16>().ok())
            .ok_or_else(|| {
                HttpError::MalformedResponse(format!("bad status line: {:?}", status_line))
            })?;
        let reason = tokens.next().map(|s| s.to_string());

        let mut head = ResponseHead {
            status,
            version,
            reason,
            headers: Vec::new(),
        };
        let mut set_cookies = Vec::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("Set-Cookie") {
                set_cookies.push(value.to_string());
                continue;
            }
            head.insert(name, value);
        }
        Ok((head, set_cookies))
    }

    /// Last-write-wins insert; replacement is case-insensitive.
    fn insert(&mut self, name: &str, value: &str) {
        if let Some(existing) = self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            existing.1 = value.to_string();
        } else {
            self.headers.push((name.to_string(), value.to_string()));
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_redirect(&self) -> bool {
        (301..=308).contains(&self.status)
    }

    /// Decide the body framing for this head. Chunked wins over any
    /// Content-Length; otherwise a parseable Content-Length is required.
    pub fn body_framing(&self) -> Result<BodyFraming, HttpError> {
        let chunked = self
            .header("Transfer-Encoding")
            .map(|v| v.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false);
        if chunked {
            return Ok(BodyFraming::Chunked);
        }
        self.header("Content-Length")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .map(BodyFraming::FixedLength)
            .ok_or(HttpError::MissingContentLength)
    }
}

/// A complete response: head plus assembled body.
#[derive(Debug, Clone)]
pub struct Response {
    pub head: ResponseHead,
    pub body: Bytes,
}

impl Response {
    pub fn new(head: ResponseHead, body: Bytes) -> Self {
        Self { head, body }
    }

    pub fn status(&self) -> u16 {
        self.head.status
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.header(name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.head.status)
    }

    /// Body as UTF-8 text, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Body parsed as JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}
