/*
 * secure.rs
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

//! Secure-transport delegation. The raw-socket path never speaks TLS; a
//! scheme upgrade hands the request to a `SecureDelegate` and returns its
//! result untouched.
//!
//! `TlsDelegate` is the built-in delegate: rustls over the same transport
//! and hop machinery, with platform native roots and webpki-roots as
//! fallback. It follows redirects itself (both schemes) under the same hop
//! budget, so a handoff never bounces back to the raw path.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::ClientConfig;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::RootCertStore;
use tokio_rustls::TlsConnector;

use crate::cookie::CookieStore;
use crate::error::HttpError;
use crate::exchange::{run_hop, HopOutcome};
use crate::operation::MAX_REDIRECTS;
use crate::request::RequestTemplate;
use crate::response::Response;
use crate::transport::StreamTransport;
use crate::url::{HttpUrl, Scheme};

pub type DelegateFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Response, HttpError>> + Send + 'a>>;

/// Native secure-transport client boundary. Invoked transparently on
/// plain-to-secure scheme upgrade, or directly for requests that start out
/// secure; the delegate's result becomes the operation's result
/// unmodified.
pub trait SecureDelegate: Send + Sync {
    fn perform(&self, template: RequestTemplate) -> DelegateFuture<'_>;
}

/// Build a root certificate store: platform native certs first, then
/// webpki-roots as fallback.
fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    if let Ok(certs) = rustls_native_certs::load_native_certs() {
        for cert in certs {
            let _ = root_store.add(cert);
        }
    }
    if root_store.is_empty() {
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    root_store
}

/// TLS client config for HTTP/1.1 (no client auth, ALPN http/1.1).
fn client_config() -> Arc<ClientConfig> {
    let mut config = ClientConfig::builder()
        .with_root_certificates(build_root_store())
        .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Arc::new(config)
}

/// Unified stream for the delegate's hops: plain TCP or TLS.
enum HttpStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for HttpStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for HttpStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_flush(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Built-in secure delegate: rustls-backed HTTP/1.1 over fresh
/// connections, sharing the cookie store with the raw path.
pub struct TlsDelegate {
    connector: TlsConnector,
    cookies: Arc<dyn CookieStore>,
}

impl TlsDelegate {
    pub fn new(cookies: Arc<dyn CookieStore>) -> Self {
        Self {
            connector: TlsConnector::from(client_config()),
            cookies,
        }
    }

    async fn connect(&self, url: &HttpUrl) -> Result<HttpStream, HttpError> {
        let tcp = TcpStream::connect((url.host.as_str(), url.port))
            .await
            .map_err(HttpError::ConnectFailure)?;
        match url.scheme {
            Scheme::Plain => Ok(HttpStream::Plain(tcp)),
            Scheme::Secure => {
                let host_static: &'static str =
                    Box::leak(url.host.clone().into_boxed_str());
                let server_name: ServerName<'static> =
                    host_static.try_into().map_err(|_| {
                        HttpError::ConnectFailure(io::Error::new(
                            io::ErrorKind::InvalidInput,
                            "invalid host name",
                        ))
                    })?;
                let tls = self
                    .connector
                    .connect(server_name, tcp)
                    .await
                    .map_err(HttpError::ConnectFailure)?;
                Ok(HttpStream::Tls(Box::new(tls)))
            }
        }
    }

    async fn run(&self, template: RequestTemplate) -> Result<Response, HttpError> {
        let mut url = template.url.clone();
        let mut hops: u32 = 0;
        loop {
            let stream = self.connect(&url).await?;
            let mut transport = StreamTransport::new(stream);
            let outcome = run_hop(&mut transport, &template, &url, &*self.cookies).await;
            transport.close().await;
            match outcome? {
                HopOutcome::Done(response) => return Ok(response),
                HopOutcome::Redirect(target) => {
                    hops += 1;
                    if hops > MAX_REDIRECTS {
                        return Err(HttpError::RedirectLoopExceeded);
                    }
                    url = target;
                }
            }
        }
    }
}

impl SecureDelegate for TlsDelegate {
    fn perform(&self, template: RequestTemplate) -> DelegateFuture<'_> {
        Box::pin(self.run(template))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_store_is_never_empty() {
        assert!(!build_root_store().is_empty());
    }

    #[tokio::test]
    async fn delegate_is_object_safe() {
        struct Canned;
        impl SecureDelegate for Canned {
            fn perform(&self, _template: RequestTemplate) -> DelegateFuture<'_> {
                Box::pin(async {
                    Err(HttpError::UpstreamDelegate("canned".to_string()))
                })
            }
        }
        let delegate: Arc<dyn SecureDelegate> = Arc::new(Canned);
        let template =
            RequestTemplate::get(HttpUrl::parse("https://example.com/").unwrap());
        let err = delegate.perform(template).await.unwrap_err();
        assert!(matches!(err, HttpError::UpstreamDelegate(_)));
    }
}
