/*
 * lib.rs
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

//! Filodiretto: an HTTP/1.1 client over raw sockets, for use when the
//! platform's native secure-transport stack is disallowed or bypassed for
//! plain-text endpoints.
//!
//! Plain-scheme requests are served by a hand-driven HTTP/1.1 exchange
//! over a fresh TCP connection per hop; secure URLs (initial or reached by
//! redirect) are always handed to a [`secure::SecureDelegate`]. Cookies
//! live in an injected [`cookie::CookieStore`] shared by both paths.

pub mod client;
pub mod cookie;
pub mod error;
pub mod exchange;
pub mod operation;
pub mod request;
pub mod response;
pub mod secure;
pub mod transport;
pub mod url;

pub use client::{HttpClient, Task, DEFAULT_MAX_CONCURRENT};
pub use cookie::{CookieStore, MemoryCookieStore};
pub use error::HttpError;
pub use operation::{Canceller, MAX_REDIRECTS};
pub use request::{Method, RequestTemplate};
pub use response::{BodyFraming, Response, ResponseHead};
pub use secure::{DelegateFuture, SecureDelegate, TlsDelegate};
pub use transport::{ReadMode, StreamTransport, TransportError};
pub use url::{HttpUrl, Scheme};
