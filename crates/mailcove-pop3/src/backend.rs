//! Capability traits the embedder supplies to the protocol engine.
//!
//! The engine owns no mail storage and no credential database. Everything it
//! needs from the outside world is reachable through two traits: [`Backend`]
//! authenticates a connection and hands out a [`MailUser`], and the
//! [`MailUser`] handle answers maildrop operations for exactly one session.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use async_trait::async_trait;

/// Opaque error type returned by backend implementations.
///
/// The engine never inspects these beyond their display text, which is
/// relayed verbatim to the client after `-ERR ` where the protocol allows it
/// (rejected logins, failed retrievals).
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Authentication and maildrop lookup, shared by every session.
///
/// The server holds one implementation behind an `Arc` for its whole
/// lifetime; `login` must be safe to call concurrently from independent
/// sessions.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Validates credentials and binds a maildrop.
    ///
    /// On success the returned [`MailUser`] is exclusively owned by the
    /// calling session until it is unlocked. `remote_addr` is the peer's
    /// presented address, available for audit logging and policy decisions.
    ///
    /// # Errors
    ///
    /// Returns an error whose display text is sent to the client after
    /// `-ERR `; the session stays in the authorization phase and may retry.
    async fn login(
        &self,
        remote_addr: SocketAddr,
        username: &str,
        password: &str,
    ) -> Result<Box<dyn MailUser>, BackendError>;
}

/// An authenticated maildrop handle, created by a successful login and
/// destroyed when the session releases it.
///
/// Message numbers are 1-based ordinals, stable for the lifetime of the
/// session's transaction phase. Messages marked by [`dele`](Self::dele)
/// disappear from [`stat`](Self::stat)/[`list`](Self::list)/
/// [`uidl`](Self::uidl)/[`retr`](Self::retr) immediately but are destroyed
/// only by [`update`](Self::update); [`rset`](Self::rset) clears the marks.
///
/// A handle is owned by one session; behavior under shared use is
/// unspecified.
#[async_trait]
pub trait MailUser: Send {
    /// Claims the exclusive maildrop lock.
    ///
    /// Must fail rather than block when another session already holds the
    /// lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be granted; the session closes.
    async fn lock(&mut self) -> Result<(), BackendError>;

    /// Releases the maildrop lock. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the release fails; the engine does not retry.
    async fn unlock(&mut self) -> Result<(), BackendError>;

    /// Commits the deletions marked in this session.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; the maildrop is still unlocked
    /// afterwards.
    async fn update(&mut self) -> Result<(), BackendError>;

    /// Message count and total octet size of the not-yet-deleted messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the maildrop cannot be read.
    async fn stat(&self) -> Result<(u64, u64), BackendError>;

    /// Per-message octet sizes keyed by ordinal, plus the total message
    /// count of the maildrop.
    ///
    /// # Errors
    ///
    /// Returns an error if the maildrop cannot be read.
    async fn list(&self) -> Result<(BTreeMap<u64, u64>, u64), BackendError>;

    /// Octet size of one message, or `None` if there is no such message.
    ///
    /// # Errors
    ///
    /// Returns an error if the maildrop cannot be read.
    async fn list_message(&self, id: u64) -> Result<Option<u64>, BackendError>;

    /// The full RFC 5322 text of one message.
    ///
    /// Dot-stuffing and CRLF framing are the engine's job, not the
    /// backend's.
    ///
    /// # Errors
    ///
    /// Returns an error whose display text is relayed to the client after
    /// `-ERR `; the session continues.
    async fn retr(&self, id: u64) -> Result<String, BackendError>;

    /// Marks one message for deletion.
    ///
    /// # Errors
    ///
    /// Returns an error if the mark cannot be recorded; the session closes.
    async fn dele(&mut self, id: u64) -> Result<(), BackendError>;

    /// Clears this session's deletion marks.
    ///
    /// # Errors
    ///
    /// Returns an error if the marks cannot be cleared; the session closes.
    async fn rset(&mut self) -> Result<(), BackendError>;

    /// Per-message unique identifiers keyed by ordinal, plus the total
    /// message count of the maildrop.
    ///
    /// Identifiers are opaque and stable across sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if the maildrop cannot be read.
    async fn uidl(&self) -> Result<(BTreeMap<u64, String>, u64), BackendError>;

    /// Unique identifier of one message, or `None` if there is no such
    /// message.
    ///
    /// # Errors
    ///
    /// Returns an error if the maildrop cannot be read.
    async fn uidl_message(&self, id: u64) -> Result<Option<String>, BackendError>;
}
