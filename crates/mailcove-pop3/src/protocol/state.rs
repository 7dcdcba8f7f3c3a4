//! Session phase tracking.
//!
//! This module defines the phases a POP3 session can be in, following
//! RFC 1939 section 3.

use crate::command::Verb;

/// Protocol phase as defined by RFC 1939.
///
/// A session has three phases:
/// - `Authorization`: connection established, credentials not yet accepted
/// - `Transaction`: login succeeded and the maildrop lock is held
/// - `Update`: QUIT was processed; terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Connection established, waiting for USER/PASS.
    ///
    /// Only USER, PASS, QUIT, and CAPA are legal here.
    #[default]
    Authorization,

    /// Authentication completed and the maildrop lock is held.
    ///
    /// STAT, LIST, RETR, DELE, NOOP, RSET, UIDL, CAPA, and QUIT are legal.
    Transaction,

    /// QUIT processed; no further commands are read.
    Update,
}

impl Phase {
    /// Returns true if `verb` may be dispatched in this phase.
    #[must_use]
    pub const fn permits(self, verb: Verb) -> bool {
        match self {
            Self::Authorization => {
                matches!(verb, Verb::User | Verb::Pass | Verb::Quit | Verb::Capa)
            }
            Self::Transaction => !matches!(verb, Verb::User | Verb::Pass),
            Self::Update => false,
        }
    }

    /// Returns true if the maildrop lock is held in this phase.
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Transaction)
    }

    /// Returns true once the session has entered its terminal phase.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Update)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    const ALL_VERBS: [Verb; 11] = [
        Verb::Quit,
        Verb::User,
        Verb::Pass,
        Verb::Stat,
        Verb::List,
        Verb::Retr,
        Verb::Dele,
        Verb::Noop,
        Verb::Rset,
        Verb::Uidl,
        Verb::Capa,
    ];

    #[test]
    fn test_phase_default() {
        assert_eq!(Phase::default(), Phase::Authorization);
    }

    #[test]
    fn test_authorization_permits_only_auth_verbs() {
        for verb in ALL_VERBS {
            let expected = matches!(verb, Verb::User | Verb::Pass | Verb::Quit | Verb::Capa);
            assert_eq!(Phase::Authorization.permits(verb), expected, "{verb}");
        }
    }

    #[test]
    fn test_transaction_rejects_credential_verbs() {
        for verb in ALL_VERBS {
            let expected = !matches!(verb, Verb::User | Verb::Pass);
            assert_eq!(Phase::Transaction.permits(verb), expected, "{verb}");
        }
    }

    #[test]
    fn test_update_permits_nothing() {
        for verb in ALL_VERBS {
            assert!(!Phase::Update.permits(verb), "{verb}");
        }
    }

    #[test]
    fn test_is_authenticated() {
        assert!(!Phase::Authorization.is_authenticated());
        assert!(Phase::Transaction.is_authenticated());
        assert!(!Phase::Update.is_authenticated());
    }

    #[test]
    fn test_is_terminal() {
        assert!(!Phase::Authorization.is_terminal());
        assert!(!Phase::Transaction.is_terminal());
        assert!(Phase::Update.is_terminal());
    }
}
