//! Per-connection session engine.
//!
//! A session owns one accepted connection and drives the read-dispatch-reply
//! loop: greet, read a request line, look up the verb, run its executor,
//! apply the returned phase, and repeat until QUIT, end of stream, timeout,
//! or a fatal error. The maildrop lock is released on every exit path that
//! acquired it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use crate::backend::{Backend, MailUser};
use crate::command::Verb;
use crate::connection::FramedStream;
use crate::error::{Error, Result};
use crate::protocol::{Phase, Request};

/// The state of one accepted connection.
///
/// Generic over the transport so the whole engine can be driven from tests
/// with an in-memory stream; the server runs it over
/// [`Pop3Stream`](crate::connection::Pop3Stream).
pub struct Session<S> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) remote_addr: SocketAddr,
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) user: Option<Box<dyn MailUser>>,
    pub(crate) username: Option<String>,
    pub(crate) last_verb: Option<Verb>,
    pub(crate) alive: bool,
    phase: Phase,
    greeting: String,
    timeout: Duration,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a session over an accepted connection.
    ///
    /// A zero `timeout` disables the idle limit.
    pub fn new(
        stream: S,
        remote_addr: SocketAddr,
        backend: Arc<dyn Backend>,
        greeting: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            stream: FramedStream::new(stream),
            remote_addr,
            backend,
            user: None,
            username: None,
            last_verb: None,
            alive: false,
            phase: Phase::Authorization,
            greeting: greeting.into(),
            timeout,
        }
    }

    /// The session's current protocol phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Drives the session to completion, consuming the connection.
    ///
    /// Returns `Ok(())` after an orderly QUIT or when the client simply goes
    /// away; any fatal protocol, backend, or transport failure is returned
    /// after the best-effort maildrop release.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that terminated the session.
    pub async fn run(mut self) -> Result<()> {
        let result = self.serve().await;
        self.release_maildrop().await;
        if let Err(err) = &result {
            warn!(peer = %self.remote_addr, error = %err, "session terminated");
        }
        result
    }

    async fn serve(&mut self) -> Result<()> {
        self.alive = true;
        let greeting = self.greeting.clone();
        self.stream.write_ok(&greeting).await?;

        while self.alive {
            let Some(line) = self.read_request().await? else {
                debug!(peer = %self.remote_addr, "connection closed by peer");
                break;
            };

            let request = Request::parse(&line);
            let Some(verb) = Verb::lookup(&request.token) else {
                self.stream.write_err("invalid command").await?;
                continue;
            };

            match verb.run(self, &request.args).await {
                Ok(next) => {
                    self.last_verb = Some(verb);
                    self.phase = next;
                }
                Err(err) => {
                    // one diagnostic line, then the connection closes
                    let _ = self.stream.write_err(&err.to_string()).await;
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    async fn read_request(&mut self) -> Result<Option<String>> {
        if self.timeout.is_zero() {
            return self.stream.read_request().await;
        }
        match tokio::time::timeout(self.timeout, self.stream.read_request()).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.timeout)),
        }
    }

    /// Best-effort release of a bound maildrop, taken on every exit path.
    ///
    /// QUIT's executor takes the handle out of the session first, so an
    /// orderly shutdown never releases twice.
    async fn release_maildrop(&mut self) {
        if let Some(mut maildrop) = self.user.take() {
            if let Err(err) = maildrop.unlock().await {
                warn!(peer = %self.remote_addr, error = %err, "failed to unlock maildrop");
            }
        }
    }

    /// The bound maildrop handle; phase gating guarantees it exists for
    /// transaction verbs.
    pub(crate) fn maildrop(&mut self) -> Result<&mut Box<dyn MailUser>> {
        self.user.as_mut().ok_or(Error::InvalidState)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use async_trait::async_trait;
    use tokio_test::io::Builder;

    use super::*;
    use crate::backend::BackendError;

    /// Backend that turns every login away; enough for the flows that never
    /// reach the transaction phase.
    struct ClosedBackend;

    #[async_trait]
    impl Backend for ClosedBackend {
        async fn login(
            &self,
            _remote_addr: SocketAddr,
            _username: &str,
            _password: &str,
        ) -> std::result::Result<Box<dyn MailUser>, BackendError> {
            Err("mailbox unavailable".into())
        }
    }

    fn session_over<S>(stream: S) -> Session<S>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        Session::new(
            stream,
            "127.0.0.1:12345".parse().unwrap(),
            Arc::new(ClosedBackend),
            "POP3 server ready",
            Duration::ZERO,
        )
    }

    #[tokio::test]
    async fn test_greeting_then_quit() {
        let mock = Builder::new()
            .write(b"+OK POP3 server ready\r\n")
            .read(b"QUIT\r\n")
            .write(b"+OK goodbye\r\n")
            .build();

        session_over(mock).run().await.unwrap();
    }

    #[tokio::test]
    async fn test_eof_terminates_cleanly() {
        let mock = Builder::new().write(b"+OK POP3 server ready\r\n").build();

        session_over(mock).run().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_verb_is_soft() {
        let mock = Builder::new()
            .write(b"+OK POP3 server ready\r\n")
            .read(b"XYZZY\r\n")
            .write(b"-ERR invalid command\r\n")
            .read(b"QUIT\r\n")
            .write(b"+OK goodbye\r\n")
            .build();

        session_over(mock).run().await.unwrap();
    }

    #[tokio::test]
    async fn test_transaction_verb_in_authorization_is_fatal() {
        let mock = Builder::new()
            .write(b"+OK POP3 server ready\r\n")
            .read(b"STAT\r\n")
            .write(b"-ERR invalid state\r\n")
            .build();

        let result = session_over(mock).run().await;
        assert!(matches!(result, Err(Error::InvalidState)));
    }

    #[tokio::test]
    async fn test_pass_without_user_is_soft() {
        let mock = Builder::new()
            .write(b"+OK POP3 server ready\r\n")
            .read(b"PASS secret\r\n")
            .write(b"-ERR PASS can be executed only directly after USER command\r\n")
            .read(b"QUIT\r\n")
            .write(b"+OK goodbye\r\n")
            .build();

        session_over(mock).run().await.unwrap();
    }

    #[tokio::test]
    async fn test_login_rejection_relays_backend_text() {
        let mock = Builder::new()
            .write(b"+OK POP3 server ready\r\n")
            .read(b"USER alice\r\n")
            .write(b"+OK user set alice\r\n")
            .read(b"PASS nope\r\n")
            .write(b"-ERR mailbox unavailable\r\n")
            .read(b"QUIT\r\n")
            .write(b"+OK goodbye\r\n")
            .build();

        session_over(mock).run().await.unwrap();
    }

    #[tokio::test]
    async fn test_capa_in_authorization() {
        let mock = Builder::new()
            .write(b"+OK POP3 server ready\r\n")
            .read(b"CAPA\r\n")
            .write(b"+OK\r\n")
            .write(b"USER\r\nUIDL\r\n.\r\n")
            .read(b"QUIT\r\n")
            .write(b"+OK goodbye\r\n")
            .build();

        session_over(mock).run().await.unwrap();
    }

    #[tokio::test]
    async fn test_verbs_are_case_insensitive() {
        let mock = Builder::new()
            .write(b"+OK POP3 server ready\r\n")
            .read(b"quit\r\n")
            .write(b"+OK goodbye\r\n")
            .build();

        session_over(mock).run().await.unwrap();
    }

    #[tokio::test]
    async fn test_user_without_argument_is_fatal() {
        let mock = Builder::new()
            .write(b"+OK POP3 server ready\r\n")
            .read(b"USER\r\n")
            .write(b"-ERR invalid argument count\r\n")
            .build();

        let result = session_over(mock).run().await;
        assert!(matches!(result, Err(Error::InvalidArgsCount)));
    }
}
