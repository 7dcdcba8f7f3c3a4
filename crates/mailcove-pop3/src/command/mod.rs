//! The POP3 verb table and one executor per verb.
//!
//! Each executor validates its arguments, calls into the backend where the
//! verb requires it, writes its reply, and returns the phase the session
//! continues in. A returned [`Error`] is fatal to the session; recoverable
//! failures write a soft `-ERR` reply and return the current phase instead.

use std::fmt;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::warn;

use crate::connection::Session;
use crate::error::{Error, Result};
use crate::protocol::Phase;

/// The POP3 verbs this server implements.
///
/// Verbs are looked up by their uppercased wire token; anything else is
/// answered with a soft `invalid command` reply by the session loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// End the session, committing deletions when authenticated.
    Quit,
    /// Name the mailbox to open.
    User,
    /// Authenticate the named mailbox and lock its maildrop.
    Pass,
    /// Report message count and total octets.
    Stat,
    /// Scan listing of message sizes.
    List,
    /// Retrieve one full message.
    Retr,
    /// Mark one message for deletion.
    Dele,
    /// Do nothing, successfully.
    Noop,
    /// Clear this session's deletion marks.
    Rset,
    /// Unique-id listing of messages.
    Uidl,
    /// Advertise server capabilities.
    Capa,
}

impl Verb {
    /// Looks up a verb by its uppercased wire token.
    #[must_use]
    pub fn lookup(token: &str) -> Option<Self> {
        Some(match token {
            "QUIT" => Self::Quit,
            "USER" => Self::User,
            "PASS" => Self::Pass,
            "STAT" => Self::Stat,
            "LIST" => Self::List,
            "RETR" => Self::Retr,
            "DELE" => Self::Dele,
            "NOOP" => Self::Noop,
            "RSET" => Self::Rset,
            "UIDL" => Self::Uidl,
            "CAPA" => Self::Capa,
            _ => return None,
        })
    }

    /// The wire name of the verb.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quit => "QUIT",
            Self::User => "USER",
            Self::Pass => "PASS",
            Self::Stat => "STAT",
            Self::List => "LIST",
            Self::Retr => "RETR",
            Self::Dele => "DELE",
            Self::Noop => "NOOP",
            Self::Rset => "RSET",
            Self::Uidl => "UIDL",
            Self::Capa => "CAPA",
        }
    }

    /// Runs the verb's executor against `session`.
    ///
    /// Phase gating happens here, before any executor or backend code: a
    /// verb that is not legal in the session's current phase fails fatally
    /// without side effects.
    pub(crate) async fn run<S>(self, session: &mut Session<S>, args: &[String]) -> Result<Phase>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if !session.phase().permits(self) {
            return Err(Error::InvalidState);
        }
        match self {
            Self::Quit => quit(session).await,
            Self::User => user(session, args).await,
            Self::Pass => pass(session, args).await,
            Self::Stat => stat(session).await,
            Self::List => list(session, args).await,
            Self::Retr => retr(session, args).await,
            Self::Dele => dele(session, args).await,
            Self::Noop => noop(session).await,
            Self::Rset => rset(session).await,
            Self::Uidl => uidl(session, args).await,
            Self::Capa => capa(session).await,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// QUIT. From the transaction phase this commits pending deletions and
/// releases the maildrop; the handle is taken out of the session first so
/// the exit path never releases twice.
async fn quit<S>(session: &mut Session<S>) -> Result<Phase>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Some(mut maildrop) = session.user.take() {
        if let Err(update_err) = maildrop.update().await {
            // the maildrop must not stay locked behind a failed commit
            if let Err(unlock_err) = maildrop.unlock().await {
                warn!(error = %unlock_err, "unlock failed after update failure");
            }
            return Err(Error::UpdateFailed(update_err));
        }
        maildrop.unlock().await.map_err(Error::UnableToUnlock)?;
    }
    session.stream.write_ok("goodbye").await?;
    session.alive = false;
    Ok(Phase::Update)
}

/// USER. Stores the mailbox name for the PASS that must follow; the backend
/// is not contacted yet.
async fn user<S>(session: &mut Session<S>, args: &[String]) -> Result<Phase>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if args.len() != 1 {
        return Err(Error::InvalidArgsCount);
    }
    session.username = Some(args[0].clone());
    let reply = format!("user set {}", args[0]);
    session.stream.write_ok(&reply).await?;
    Ok(Phase::Authorization)
}

/// PASS. Only legal directly after USER. A rejected login is soft and keeps
/// the stored username so the client can retry without reconnecting; a
/// granted login binds the maildrop and locks it.
async fn pass<S>(session: &mut Session<S>, args: &[String]) -> Result<Phase>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if args.len() != 1 {
        return Err(Error::InvalidArgsCount);
    }
    if session.last_verb != Some(Verb::User) {
        session
            .stream
            .write_err("PASS can be executed only directly after USER command")
            .await?;
        return Ok(Phase::Authorization);
    }

    let username = session.username.clone().unwrap_or_default();
    let login = session
        .backend
        .login(session.remote_addr, &username, &args[0])
        .await;

    let mut maildrop = match login {
        Ok(maildrop) => maildrop,
        Err(err) => {
            session.stream.write_err(&err.to_string()).await?;
            return Ok(Phase::Authorization);
        }
    };

    if let Err(err) = maildrop.lock().await {
        // hand the handle to the session exit path for its best-effort unlock
        session.user = Some(maildrop);
        return Err(Error::UnableToLock(err));
    }
    session.user = Some(maildrop);

    session.stream.write_ok("login successful").await?;
    Ok(Phase::Transaction)
}

/// STAT. Drop listing: message count and total octets.
async fn stat<S>(session: &mut Session<S>) -> Result<Phase>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (count, octets) = session.maildrop()?.stat().await.map_err(Error::Backend)?;
    let reply = format!("{count} {octets}");
    session.stream.write_ok(&reply).await?;
    Ok(Phase::Transaction)
}

/// LIST. Without an argument, a multi-line scan listing; with one, the size
/// of that message. A malformed argument or a missing message is soft.
async fn list<S>(session: &mut Session<S>, args: &[String]) -> Result<Phase>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Some(arg) = args.first() {
        let Ok(id) = arg.parse::<u64>() else {
            session.stream.write_err("invalid argument").await?;
            return Ok(Phase::Transaction);
        };
        match session
            .maildrop()?
            .list_message(id)
            .await
            .map_err(Error::Backend)?
        {
            Some(octets) => {
                let reply = format!("{id} {octets}");
                session.stream.write_ok(&reply).await?;
            }
            None => session.stream.write_err("no such message").await?,
        }
    } else {
        let (octets, total) = session.maildrop()?.list().await.map_err(Error::Backend)?;
        let header = format!("{} messages out of {total}", octets.len());
        session.stream.write_ok(&header).await?;
        let lines: Vec<String> = octets
            .iter()
            .map(|(id, size)| format!("{id} {size}"))
            .collect();
        session
            .stream
            .write_multi(lines.iter().map(String::as_str), true)
            .await?;
    }
    Ok(Phase::Transaction)
}

/// RETR. Emits the full message as a dot-stuffed multi-line payload. The
/// backend choosing not to serve the message is soft; a missing or
/// malformed argument is not.
async fn retr<S>(session: &mut Session<S>, args: &[String]) -> Result<Phase>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if args.len() != 1 {
        return Err(Error::InvalidArgsCount);
    }
    let id = args[0]
        .parse::<u64>()
        .map_err(|_| Error::InvalidArgument(args[0].clone()))?;

    match session.maildrop()?.retr(id).await {
        Ok(message) => {
            session.stream.write_ok("").await?;
            session.stream.write_multi(message.split('\n'), false).await?;
        }
        Err(err) => session.stream.write_err(&err.to_string()).await?,
    }
    Ok(Phase::Transaction)
}

/// DELE. Marks one message for deletion; the mark lands at Update.
async fn dele<S>(session: &mut Session<S>, args: &[String]) -> Result<Phase>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if args.len() != 1 {
        return Err(Error::InvalidArgsCount);
    }
    let id = args[0]
        .parse::<u64>()
        .map_err(|_| Error::InvalidArgument(args[0].clone()))?;

    session.maildrop()?.dele(id).await.map_err(Error::Backend)?;
    let reply = format!("message {id} deleted");
    session.stream.write_ok(&reply).await?;
    Ok(Phase::Transaction)
}

/// NOOP.
async fn noop<S>(session: &mut Session<S>) -> Result<Phase>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    session.stream.write_ok("").await?;
    Ok(Phase::Transaction)
}

/// RSET. Unmarks every message this session marked for deletion.
async fn rset<S>(session: &mut Session<S>) -> Result<Phase>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    session.maildrop()?.rset().await.map_err(Error::Backend)?;
    session.stream.write_ok("").await?;
    Ok(Phase::Transaction)
}

/// UIDL. Argument handling mirrors LIST, with unique identifiers instead of
/// sizes.
async fn uidl<S>(session: &mut Session<S>, args: &[String]) -> Result<Phase>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Some(arg) = args.first() {
        let Ok(id) = arg.parse::<u64>() else {
            session.stream.write_err("invalid argument").await?;
            return Ok(Phase::Transaction);
        };
        match session
            .maildrop()?
            .uidl_message(id)
            .await
            .map_err(Error::Backend)?
        {
            Some(uid) => {
                let reply = format!("{id} {uid}");
                session.stream.write_ok(&reply).await?;
            }
            None => session.stream.write_err("no such message").await?,
        }
    } else {
        let (uids, _total) = session.maildrop()?.uidl().await.map_err(Error::Backend)?;
        session.stream.write_ok("").await?;
        let lines: Vec<String> = uids.iter().map(|(id, uid)| format!("{id} {uid}")).collect();
        session
            .stream
            .write_multi(lines.iter().map(String::as_str), true)
            .await?;
    }
    Ok(Phase::Transaction)
}

/// CAPA. Legal in any phase and leaves the phase untouched.
async fn capa<S>(session: &mut Session<S>) -> Result<Phase>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    session.stream.write_ok("").await?;
    session.stream.write_multi(["USER", "UIDL"], false).await?;
    Ok(session.phase())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_verbs() {
        for (token, verb) in [
            ("QUIT", Verb::Quit),
            ("USER", Verb::User),
            ("PASS", Verb::Pass),
            ("STAT", Verb::Stat),
            ("LIST", Verb::List),
            ("RETR", Verb::Retr),
            ("DELE", Verb::Dele),
            ("NOOP", Verb::Noop),
            ("RSET", Verb::Rset),
            ("UIDL", Verb::Uidl),
            ("CAPA", Verb::Capa),
        ] {
            assert_eq!(Verb::lookup(token), Some(verb));
            assert_eq!(verb.as_str(), token);
        }
    }

    #[test]
    fn test_lookup_is_exact() {
        assert_eq!(Verb::lookup("quit"), None);
        assert_eq!(Verb::lookup("TOP"), None);
        assert_eq!(Verb::lookup("APOP"), None);
        assert_eq!(Verb::lookup(""), None);
    }

    #[test]
    fn test_display_matches_wire_name() {
        assert_eq!(Verb::Retr.to_string(), "RETR");
        assert_eq!(format!("{}", Verb::Capa), "CAPA");
    }
}
