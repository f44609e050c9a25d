/*
 * client.rs
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

//! High-level client: holds the cookie store, the secure delegate, and the
//! bounded worker pool for raw-socket operations.
//!
//! Raw (plain-scheme) operations acquire a pool permit before touching the
//! network; operations past the cap queue until a slot frees. Secure
//! requests go straight to the delegate and are not pooled. Must be used
//! from within a tokio runtime. No per-operation timeout is imposed; wrap
//! `Task::result` (or `request`) in `tokio::time::timeout` if a deadline
//! is needed.

use std::sync::Arc;

use tokio::sync::{oneshot, Semaphore};

use crate::cookie::{CookieStore, MemoryCookieStore};
use crate::error::HttpError;
use crate::operation::{CancelState, Canceller, Operation};
use crate::request::RequestTemplate;
use crate::response::Response;
use crate::secure::{SecureDelegate, TlsDelegate};
use crate::url::{HttpUrl, Scheme};

/// Default cap on concurrently active raw-socket operations.
pub const DEFAULT_MAX_CONCURRENT: usize = 12;

/// Handle to one submitted operation: cancel it, or await its single
/// outcome. Cancelling after completion has no effect.
pub struct Task {
    canceller: Canceller,
    result: oneshot::Receiver<Result<Response, HttpError>>,
}

impl Task {
    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    /// Detached cancel handle, usable after `result` consumes the task.
    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    /// Await the operation's outcome. Exactly one outcome is ever
    /// delivered per task.
    pub async fn result(self) -> Result<Response, HttpError> {
        self.result.await.unwrap_or(Err(HttpError::Cancelled))
    }
}

/// HTTP client facade over the raw-socket path and the secure delegate.
pub struct HttpClient {
    cookies: Arc<dyn CookieStore>,
    delegate: Option<Arc<dyn SecureDelegate>>,
    pool: Arc<Semaphore>,
}

impl HttpClient {
    /// Client with an in-memory cookie store, the rustls delegate sharing
    /// that store, and the default pool size.
    pub fn new() -> Self {
        let cookies: Arc<dyn CookieStore> = Arc::new(MemoryCookieStore::new());
        let delegate: Arc<dyn SecureDelegate> = Arc::new(TlsDelegate::new(cookies.clone()));
        Self {
            cookies,
            delegate: Some(delegate),
            pool: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT)),
        }
    }

    /// Replace the cookie store. Note the default delegate keeps the store
    /// it was built with; set the delegate after the store if both change.
    pub fn with_cookie_store(mut self, cookies: Arc<dyn CookieStore>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_delegate(mut self, delegate: Arc<dyn SecureDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    pub fn without_delegate(mut self) -> Self {
        self.delegate = None;
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.pool = Arc::new(Semaphore::new(max.max(1)));
        self
    }

    /// Submit an operation and return its handle immediately.
    pub fn submit(&self, template: RequestTemplate) -> Task {
        let (tx, rx) = oneshot::channel();
        let cancel = Arc::new(CancelState::default());
        let canceller = Canceller(cancel.clone());

        if template.url.scheme == Scheme::Secure {
            // Ambient delegate path: not subject to the worker pool.
            let delegate = self.delegate.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let result = match delegate {
                    Some(delegate) => tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Err(HttpError::Cancelled),
                        performed = delegate.perform(template) => performed,
                    },
                    None => Err(HttpError::UpstreamDelegate(
                        "no secure-transport delegate configured".to_string(),
                    )),
                };
                let _ = tx.send(result);
            });
            return Task { canceller, result: rx };
        }

        let operation = Operation {
            template,
            cookies: self.cookies.clone(),
            delegate: self.delegate.clone(),
            cancel: cancel.clone(),
        };
        let pool = self.pool.clone();
        tokio::spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let _ = tx.send(Err(HttpError::Cancelled));
                    return;
                }
                acquired = pool.acquire_owned() => acquired,
            };
            let result = match permit {
                Ok(_permit) => operation.run().await,
                Err(_) => Err(HttpError::Cancelled),
            };
            let _ = tx.send(result);
        });
        Task { canceller, result: rx }
    }

    /// Submit and await in one call.
    pub async fn request(&self, template: RequestTemplate) -> Result<Response, HttpError> {
        self.submit(template).result().await
    }

    /// GET a URL string.
    pub async fn get(&self, url: &str) -> Result<Response, HttpError> {
        let url = HttpUrl::parse(url)?;
        self.request(RequestTemplate::get(url)).await
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}
