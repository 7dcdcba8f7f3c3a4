//! The TCP/TLS listener for the POP3 service.
//!
//! The server binds the configured address, greets and serves each accepted
//! connection on its own task, and keeps accepting until [`Server::close`]
//! is called. Listener shutdown never tears down in-flight sessions; they
//! finish naturally.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;
use tracing::{info, warn};

use crate::backend::Backend;
use crate::connection::{Pop3Stream, Session};
use crate::error::{Error, Result};

/// Greeting used when the embedder does not configure one.
pub const DEFAULT_GREETING: &str = "POP3 server ready";

/// Configuration for a POP3 server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Welcome text sent after `+OK ` when a connection is accepted.
    pub greeting: String,
    /// Host and port the listener binds, e.g. `0.0.0.0:110`.
    pub address: String,
    /// Idle time after which a session is closed. Zero disables the limit.
    pub timeout: Duration,
    /// TLS configuration for [`Server::listen_tls`].
    pub tls: Option<Arc<rustls::ServerConfig>>,
}

impl ServerConfig {
    /// Creates a configuration for the given listen address with the
    /// default greeting, no idle timeout, and no TLS.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            address: address.into(),
            timeout: Duration::ZERO,
            tls: None,
        }
    }

    /// Sets the greeting text.
    #[must_use]
    pub fn greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    /// Sets the idle timeout. Zero disables the limit.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Supplies the TLS configuration used by [`Server::listen_tls`].
    #[must_use]
    pub fn tls(mut self, tls: Arc<rustls::ServerConfig>) -> Self {
        self.tls = Some(tls);
        self
    }
}

/// A POP3 server: one listener plus the backend shared by its sessions.
pub struct Server {
    config: ServerConfig,
    backend: Arc<dyn Backend>,
    shutdown: watch::Sender<bool>,
    bound: OnceLock<SocketAddr>,
}

impl Server {
    /// Creates a server from a configuration and a backend.
    #[must_use]
    pub fn new(config: ServerConfig, backend: Arc<dyn Backend>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            backend,
            shutdown,
            bound: OnceLock::new(),
        }
    }

    /// The address the listener actually bound, once a listen call has
    /// bound it. Useful when the configured address has port 0.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.bound.get().copied()
    }

    /// Stops accepting connections. In-flight sessions run to completion.
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }

    /// Serves plaintext POP3 on the configured address until
    /// [`close`](Self::close) is called.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn listen(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.address).await?;
        self.accept_loop(listener, None).await
    }

    /// Serves TLS-terminated POP3 on the configured address until
    /// [`close`](Self::close) is called.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingTlsConfig`] if the configuration carries no
    /// TLS settings, or an error if the address cannot be bound.
    pub async fn listen_tls(&self) -> Result<()> {
        let tls = self.config.tls.clone().ok_or(Error::MissingTlsConfig)?;
        let listener = TcpListener::bind(&self.config.address).await?;
        self.accept_loop(listener, Some(TlsAcceptor::from(tls))).await
    }

    async fn accept_loop(&self, listener: TcpListener, acceptor: Option<TlsAcceptor>) -> Result<()> {
        let local = listener.local_addr()?;
        let _ = self.bound.set(local);
        info!(%local, tls = acceptor.is_some(), "POP3 server listening");

        let mut shutdown = self.shutdown.subscribe();
        loop {
            let (socket, peer) = tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => break,
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        warn!(error = %err, "failed to accept inbound connection");
                        continue;
                    }
                },
            };

            let backend = Arc::clone(&self.backend);
            let greeting = self.config.greeting.clone();
            let timeout = self.config.timeout;
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let stream = match acceptor {
                    Some(acceptor) => match acceptor.accept(socket).await {
                        Ok(tls) => Pop3Stream::tls(tls),
                        Err(err) => {
                            warn!(%peer, error = %err, "TLS handshake failed");
                            return;
                        }
                    },
                    None => Pop3Stream::plain(socket),
                };
                // Session::run logs its own termination cause.
                let _ = Session::new(stream, peer, backend, greeting, timeout)
                    .run()
                    .await;
            });
        }

        info!(%local, "POP3 listener closed");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ServerConfig::new("127.0.0.1:110");
        assert_eq!(config.greeting, DEFAULT_GREETING);
        assert_eq!(config.address, "127.0.0.1:110");
        assert!(config.timeout.is_zero());
        assert!(config.tls.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = ServerConfig::new("127.0.0.1:0")
            .greeting("hi there")
            .timeout(Duration::from_secs(30));
        assert_eq!(config.greeting, "hi there");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
