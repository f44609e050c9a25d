/*
 * cookie.rs
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

//! Cookie store shared across operations. Injected explicitly rather than
//! reached through a process-wide singleton; the store is the only mutable
//! state shared between concurrent operations.
//!
//! `MemoryCookieStore` is a session store: Domain, Path, and Secure
//! attributes are honored, Expires/Max-Age are accepted but not enforced.
//! Updates commit atomically per `receive` call (one write lock for the
//! whole batch) and replace any cookie with the same (domain, path, name).

use std::sync::RwLock;

use crate::url::{HttpUrl, Scheme};

/// URL-indexed cookie state consulted when building outgoing requests.
/// Implementations must tolerate concurrent readers and writers; readers
/// observe the latest committed update.
pub trait CookieStore: Send + Sync {
    /// Record the Set-Cookie header values of a response, keyed by the
    /// response URL.
    fn receive(&self, set_cookie_values: &[String], url: &HttpUrl);

    /// Cookies applicable to a request URL, as ordered name=value pairs
    /// (longest path first).
    fn lookup(&self, url: &HttpUrl) -> Vec<(String, String)>;
}

#[derive(Debug, Clone)]
struct StoredCookie {
    name: String,
    value: String,
    domain: String,
    /// Set when no Domain attribute was given: the cookie only matches the
    /// exact origin host, not subdomains.
    host_only: bool,
    path: String,
    secure: bool,
}

/// In-memory cookie store. Suitable as the process-wide store shared by
/// the raw-socket path and the secure delegate.
#[derive(Default)]
pub struct MemoryCookieStore {
    cookies: RwLock<Vec<StoredCookie>>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CookieStore for MemoryCookieStore {
    fn receive(&self, set_cookie_values: &[String], url: &HttpUrl) {
        let parsed: Vec<StoredCookie> = set_cookie_values
            .iter()
            .filter_map(|v| parse_set_cookie(v, url))
            .collect();
        if parsed.is_empty() {
            return;
        }
        let mut cookies = match self.cookies.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for cookie in parsed {
            if let Some(existing) = cookies.iter_mut().find(|c| {
                c.name == cookie.name && c.domain == cookie.domain && c.path == cookie.path
            }) {
                *existing = cookie;
            } else {
                cookies.push(cookie);
            }
        }
    }

    fn lookup(&self, url: &HttpUrl) -> Vec<(String, String)> {
        let cookies = match self.cookies.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut matched: Vec<&StoredCookie> = cookies
            .iter()
            .filter(|c| {
                domain_matches(c, &url.host)
                    && path_matches(&c.path, &url.path)
                    && (!c.secure || url.scheme == Scheme::Secure)
            })
            .collect();
        matched.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        matched
            .into_iter()
            .map(|c| (c.name.clone(), c.value.clone()))
            .collect()
    }
}

/// Parse one Set-Cookie value: `name=value; Attr; Attr=V; ...`.
fn parse_set_cookie(value: &str, url: &HttpUrl) -> Option<StoredCookie> {
    let mut segments = value.split(';');
    let (name, cookie_value) = segments.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let mut cookie = StoredCookie {
        name: name.to_string(),
        value: cookie_value.trim().to_string(),
        domain: url.host.clone(),
        host_only: true,
        path: default_path(&url.path),
        secure: false,
    };
    for segment in segments {
        let (attr, attr_value) = match segment.split_once('=') {
            Some((a, v)) => (a.trim(), v.trim()),
            None => (segment.trim(), ""),
        };
        if attr.eq_ignore_ascii_case("domain") && !attr_value.is_empty() {
            cookie.domain = attr_value
                .trim_start_matches('.')
                .to_ascii_lowercase();
            cookie.host_only = false;
        } else if attr.eq_ignore_ascii_case("path") && attr_value.starts_with('/') {
            cookie.path = attr_value.to_string();
        } else if attr.eq_ignore_ascii_case("secure") {
            cookie.secure = true;
        }
        // Expires/Max-Age/HttpOnly/SameSite accepted but not enforced.
    }
    Some(cookie)
}

/// RFC 6265 default-path: the request path up to its last slash.
fn default_path(request_path: &str) -> String {
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => request_path[..i].to_string(),
    }
}

fn domain_matches(cookie: &StoredCookie, host: &str) -> bool {
    if cookie.host_only {
        cookie.domain == host
    } else {
        host == cookie.domain || host.ends_with(&format!(".{}", cookie.domain))
    }
}

fn path_matches(cookie_path: &str, request_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/')
            || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> HttpUrl {
        HttpUrl::parse(s).unwrap()
    }

    fn lines(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn stores_and_returns_for_same_host() {
        let store = MemoryCookieStore::new();
        store.receive(&lines(&["sid=abc123"]), &url("http://example.com/login"));
        let got = store.lookup(&url("http://example.com/other"));
        assert_eq!(got, vec![("sid".to_string(), "abc123".to_string())]);
    }

    #[test]
    fn host_only_cookie_does_not_leak_to_subdomain() {
        let store = MemoryCookieStore::new();
        store.receive(&lines(&["sid=1"]), &url("http://example.com/"));
        assert!(store.lookup(&url("http://sub.example.com/")).is_empty());
    }

    #[test]
    fn domain_attribute_covers_subdomains() {
        let store = MemoryCookieStore::new();
        store.receive(
            &lines(&["sid=1; Domain=.example.com"]),
            &url("http://example.com/"),
        );
        assert_eq!(store.lookup(&url("http://sub.example.com/")).len(), 1);
        assert!(store.lookup(&url("http://notexample.com/")).is_empty());
    }

    #[test]
    fn path_attribute_limits_and_orders() {
        let store = MemoryCookieStore::new();
        store.receive(
            &lines(&["a=1; Path=/", "b=2; Path=/deep"]),
            &url("http://example.com/"),
        );
        let got = store.lookup(&url("http://example.com/deep/page"));
        // Longest path first.
        assert_eq!(
            got,
            vec![
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "1".to_string())
            ]
        );
        let shallow = store.lookup(&url("http://example.com/top"));
        assert_eq!(shallow, vec![("a".to_string(), "1".to_string())]);
        // Prefix without a segment boundary is not a match.
        assert_eq!(
            store.lookup(&url("http://example.com/deeper")).len(),
            1
        );
    }

    #[test]
    fn last_write_wins_per_name_domain_path() {
        let store = MemoryCookieStore::new();
        let u = url("http://example.com/");
        store.receive(&lines(&["sid=old"]), &u);
        store.receive(&lines(&["sid=new"]), &u);
        assert_eq!(
            store.lookup(&u),
            vec![("sid".to_string(), "new".to_string())]
        );
    }

    #[test]
    fn secure_cookie_withheld_from_plain_requests() {
        let store = MemoryCookieStore::new();
        store.receive(&lines(&["t=1; Secure"]), &url("https://example.com/"));
        assert!(store.lookup(&url("http://example.com/")).is_empty());
        assert_eq!(store.lookup(&url("https://example.com/")).len(), 1);
    }
}
