/*
 * url.rs
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

//! HTTP URLs: absolute http/https parsing and Location reference resolution.
//! The scheme is carried as a typed enum so plain vs secure is decided once
//! at parse time, not re-derived from strings.

use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::HttpError;

/// Characters escaped when rendering the request target. Already-encoded
/// `%XX` sequences are left alone ('%' is not in the set).
const TARGET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^');

/// URL scheme. Plain URLs are handled by the raw-socket path; secure URLs
/// are always handed to the secure-transport delegate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Plain,
    Secure,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Plain => "http",
            Scheme::Secure => "https",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Plain => 80,
            Scheme::Secure => 443,
        }
    }
}

/// Parsed absolute HTTP URL. Path always starts with '/'; the query is
/// stored without the leading '?'. Fragments are dropped at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpUrl {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub query: Option<String>,
}

impl HttpUrl {
    /// Parse an absolute http:// or https:// URL.
    pub fn parse(input: &str) -> Result<Self, HttpError> {
        let input = input.trim();
        if let Some(r) = input.strip_prefix("http://") {
            Self::from_parts(Scheme::Plain, r, input)
        } else if let Some(r) = input.strip_prefix("https://") {
            Self::from_parts(Scheme::Secure, r, input)
        } else {
            Err(HttpError::BadUrl(input.to_string()))
        }
    }

    fn from_parts(scheme: Scheme, rest: &str, original: &str) -> Result<Self, HttpError> {
        let bad = || HttpError::BadUrl(original.to_string());
        let rest = match rest.split_once('#') {
            Some((r, _fragment)) => r,
            None => rest,
        };
        let (authority, path_and_query) = match rest.find(['/', '?']) {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, ""),
        };
        // Userinfo is not used by this client; strip it if present.
        let host_port = match authority.rsplit_once('@') {
            Some((_userinfo, hp)) => hp,
            None => authority,
        };
        let (host, port) = match host_port.rsplit_once(':') {
            Some((h, p)) => (h, p.parse::<u16>().map_err(|_| bad())?),
            None => (host_port, scheme.default_port()),
        };
        if host.is_empty() {
            return Err(bad());
        }
        let (path, query) = split_path_query(path_and_query);
        Ok(Self {
            scheme,
            host: host.to_ascii_lowercase(),
            port,
            path,
            query,
        })
    }

    /// Resolve a Location reference against this URL: absolute URLs,
    /// scheme-relative (`//host/...`), absolute-path, and relative-path
    /// references are supported. Dot segments are removed.
    pub fn resolve(&self, reference: &str) -> Result<HttpUrl, HttpError> {
        let reference = reference.trim();
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return Self::parse(reference);
        }
        if let Some(rest) = reference.strip_prefix("//") {
            return Self::from_parts(self.scheme, rest, reference);
        }
        let mut resolved = self.clone();
        if let Some(abs) = reference.strip_prefix('/') {
            let (path, query) = split_path_query(&format!("/{}", abs));
            resolved.path = remove_dot_segments(&path);
            resolved.query = query;
            return Ok(resolved);
        }
        if reference.is_empty() {
            return Ok(resolved);
        }
        // Relative path: merge with the directory of the current path.
        let base_dir = match self.path.rfind('/') {
            Some(i) => &self.path[..=i],
            None => "/",
        };
        let (path, query) = split_path_query(&format!("{}{}", base_dir, reference));
        resolved.path = remove_dot_segments(&path);
        resolved.query = query;
        Ok(resolved)
    }

    /// `path?query` as written on the request line, with unsafe bytes escaped.
    pub fn request_target(&self) -> String {
        let mut target = utf8_percent_encode(&self.path, TARGET).to_string();
        if let Some(q) = &self.query {
            target.push('?');
            target.push_str(&utf8_percent_encode(q, TARGET).to_string());
        }
        target
    }

    /// Host header value: port elided when it is the scheme default.
    pub fn host_header(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for HttpUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme.as_str(), self.host_header(), self.path)?;
        if let Some(q) = &self.query {
            write!(f, "?{}", q)?;
        }
        Ok(())
    }
}

fn split_path_query(path_and_query: &str) -> (String, Option<String>) {
    match path_and_query.split_once('?') {
        Some((p, q)) => (normalize_path(p), Some(q.to_string())),
        None => (normalize_path(path_and_query), None),
    }
}

fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

/// RFC 3986 §5.2.4, simplified for already-rooted paths.
fn remove_dot_segments(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let trailing_slash = path.ends_with('/') || path.ends_with("/.") || path.ends_with("/..");
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            s => out.push(s),
        }
    }
    let mut result = String::from("/");
    result.push_str(&out.join("/"));
    if trailing_slash && result.len() > 1 {
        result.push('/');
    }
    result
}
