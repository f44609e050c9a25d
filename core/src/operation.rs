/*
 * operation.rs
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

//! One logical operation: the redirect-chasing hop loop over fresh plain
//! connections, the secure-upgrade handoff, and cooperative cancellation.
//!
//! Cancellation flips a flag and wakes the operation at its next await
//! point; a cancel before connect finalizes without touching the network,
//! and a cancel mid-flight closes the transport and suppresses the natural
//! completion. The oneshot completion channel makes "at most one outcome"
//! structural. No per-operation timeout exists here; callers wrap the
//! awaited result in their own deadline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::cookie::CookieStore;
use crate::error::HttpError;
use crate::exchange::{run_hop, HopOutcome};
use crate::request::RequestTemplate;
use crate::response::Response;
use crate::secure::SecureDelegate;
use crate::transport::StreamTransport;
use crate::url::Scheme;

/// Redirect hops permitted before `RedirectLoopExceeded`.
pub const MAX_REDIRECTS: u32 = 10;

/// Shared cancel state: a flag plus a wakeup for awaiting operations.
#[derive(Default)]
pub(crate) struct CancelState {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelState {
    pub(crate) fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolve once cancel has been requested. The notified future is
    /// created before the flag check so a concurrent cancel is never
    /// missed.
    pub(crate) async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Cloneable cancel handle, detached from the result. Safe to call from
/// any thread, any number of times; only the first call has an effect.
#[derive(Clone)]
pub struct Canceller(pub(crate) Arc<CancelState>);

impl Canceller {
    pub fn cancel(&self) {
        self.0.cancel();
    }
}

/// One logical request bound to its collaborators.
pub(crate) struct Operation {
    pub(crate) template: RequestTemplate,
    pub(crate) cookies: Arc<dyn CookieStore>,
    pub(crate) delegate: Option<Arc<dyn SecureDelegate>>,
    pub(crate) cancel: Arc<CancelState>,
}

impl Operation {
    /// Drive the request to one outcome. Every hop opens a fresh
    /// connection; the transport is closed before any outcome, success or
    /// failure, leaves this function.
    pub(crate) async fn run(self) -> Result<Response, HttpError> {
        let mut url = self.template.url.clone();
        let mut hops: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(HttpError::Cancelled);
            }
            let mut transport = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(HttpError::Cancelled),
                opened = StreamTransport::open(&url.host, url.port) => opened?,
            };
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    transport.close().await;
                    return Err(HttpError::Cancelled);
                }
                hopped = run_hop(&mut transport, &self.template, &url, &*self.cookies) => hopped,
            };
            transport.close().await;
            match outcome? {
                HopOutcome::Done(response) => return Ok(response),
                HopOutcome::Redirect(target) => {
                    hops += 1;
                    if hops > MAX_REDIRECTS {
                        return Err(HttpError::RedirectLoopExceeded);
                    }
                    if target.scheme == Scheme::Secure {
                        // Architectural boundary: the original request,
                        // retargeted, goes verbatim to the secure stack and
                        // its result is ours unmodified.
                        let mut upgraded = self.template.clone();
                        upgraded.url = target;
                        return match &self.delegate {
                            Some(delegate) => delegate.perform(upgraded).await,
                            None => Err(HttpError::UpstreamDelegate(
                                "no secure-transport delegate configured".to_string(),
                            )),
                        };
                    }
                    url = target;
                }
            }
        }
    }
}
