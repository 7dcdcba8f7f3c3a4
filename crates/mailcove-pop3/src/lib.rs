//! # mailcove-pop3
//!
//! A production-quality server-side implementation of the Post Office
//! Protocol version 3 (RFC 1939).
//!
//! ## Features
//!
//! - **Pluggable storage**: the protocol engine reaches mail and credentials
//!   only through the [`Backend`] and [`MailUser`] traits; no mail-store
//!   format is baked in
//! - **Three-phase state machine**: AUTHORIZATION → TRANSACTION → UPDATE,
//!   with phase gating enforced before any executor or backend code runs
//! - **Strict wire framing**: CRLF status lines, dot-stuffed multi-line
//!   payloads, bare-LF tolerance on input
//! - **TLS via rustls**: plaintext and TLS-terminated listeners without an
//!   OpenSSL dependency
//! - **Testable core**: the session engine is generic over the transport and
//!   runs against in-memory streams without opening a socket
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use mailcove_pop3::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> mailcove_pop3::Result<()> {
//!     // MaildirBackend implements mailcove_pop3::Backend.
//!     let backend = Arc::new(MaildirBackend::open("/var/mail")?);
//!
//!     let config = ServerConfig::new("0.0.0.0:110")
//!         .greeting("mailcove POP3 service ready")
//!         .timeout(Duration::from_secs(600));
//!
//!     let server = Server::new(config, backend);
//!     server.listen().await
//! }
//! ```
//!
//! ## Session phases
//!
//! Each accepted connection walks the state machine defined by RFC 1939
//! section 3:
//!
//! ```text
//! ┌───────────────┐
//! │ AUTHORIZATION │ ── USER + PASS (login + maildrop lock) ──→ TRANSACTION
//! └───────────────┘
//!         │
//!         ▼
//! ┌───────────────┐
//! │  TRANSACTION  │ ── QUIT (commit deletions, unlock) ──→ UPDATE
//! └───────────────┘
//!         │
//!         ▼
//! ┌───────────────┐
//! │    UPDATE     │  terminal; the connection closes
//! └───────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`backend`]: capability traits the embedder supplies
//! - [`command`]: the verb table and one executor per POP3 verb
//! - [`connection`]: accepted-stream types, wire framing, and the session engine
//! - [`protocol`]: session phases and request-line parsing
//! - [`server`]: the TCP/TLS listener

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod backend;
pub mod command;
pub mod connection;
mod error;
pub mod protocol;
pub mod server;

pub use backend::{Backend, BackendError, MailUser};
pub use command::Verb;
pub use connection::{FramedStream, Pop3Stream, Session};
pub use error::{Error, Result};
pub use protocol::{Phase, Request};
pub use server::{Server, ServerConfig, DEFAULT_GREETING};

/// POP3 protocol revision implemented by this crate.
pub const POP3_VERSION: &str = "POP3 (RFC 1939)";
