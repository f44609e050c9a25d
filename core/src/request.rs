/*
 * request.rs
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

//! Request template: method, absolute URL, headers, optional body. The
//! template is immutable during an operation so every redirect hop replays
//! the original method, headers, and body.

use crate::cookie::CookieStore;
use crate::url::HttpUrl;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    Trace,
    Other(&'static str),
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
            Method::Trace => "TRACE",
            Method::Other(s) => s,
        }
    }
}

/// One logical request. Headers keep insertion order; setting a name that
/// is already present replaces it (comparison is case-insensitive per
/// HTTP).
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    pub method: Method,
    pub url: HttpUrl,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl RequestTemplate {
    pub fn new(method: Method, url: HttpUrl) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: HttpUrl) -> Self {
        Self::new(Method::Get, url)
    }

    /// Add or replace a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if let Some(existing) = self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            existing.1 = value;
        } else {
            self.headers.push((name, value));
        }
        self
    }

    pub fn body(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.body = Some(data.into());
        self
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Serialize head and body for one hop against `url` (the original URL
    /// or a redirect target). Cookies applicable to the hop URL are read
    /// from the store at serialization time; a body always gets an exact
    /// Content-Length, never outbound chunking.
    pub fn serialize(&self, url: &HttpUrl, cookies: &dyn CookieStore) -> Vec<u8> {
        let mut head = String::new();
        head.push_str(self.method.as_str());
        head.push(' ');
        head.push_str(&url.request_target());
        head.push_str(" HTTP/1.1\r\n");
        push_header(&mut head, "Host", &url.host_header());

        if !self.has_header("Accept") {
            push_header(&mut head, "Accept", "*/*");
        }
        if !self.has_header("User-Agent") {
            push_header(
                &mut head,
                "User-Agent",
                concat!("filodiretto/", env!("CARGO_PKG_VERSION")),
            );
        }
        for (name, value) in &self.headers {
            // The store and the body decide these, not the caller.
            if name.eq_ignore_ascii_case("Host")
                || name.eq_ignore_ascii_case("Content-Length")
                || name.eq_ignore_ascii_case("Cookie")
            {
                continue;
            }
            push_header(&mut head, name, value);
        }

        let pairs = cookies.lookup(url);
        if !pairs.is_empty() {
            let line = pairs
                .iter()
                .map(|(n, v)| format!("{}={}", n, v))
                .collect::<Vec<_>>()
                .join("; ");
            push_header(&mut head, "Cookie", &line);
        }

        if let Some(body) = &self.body {
            push_header(&mut head, "Content-Length", &body.len().to_string());
        }
        head.push_str("\r\n");

        let mut out = head.into_bytes();
        if let Some(body) = &self.body {
            out.extend_from_slice(body);
        }
        out
    }
}

fn push_header(head: &mut String, name: &str, value: &str) {
    head.push_str(name);
    head.push_str(": ");
    head.push_str(value);
    head.push_str("\r\n");
}
