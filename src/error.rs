// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

/// Error taxonomy for the session synchronization protocol.
///
/// Every variant maps to a stable `code()` so it can be carried over the wire inside a
/// `sync-error` node's `domain`/`code` attributes and reconstructed on the other end with
/// [`SessionError::from_domain_and_code`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("message not permitted in the current synchronization phase")]
    UnexpectedNode,

    #[error("required `id` attribute missing from user properties")]
    IdNotPresent,

    #[error("required `name` attribute missing from user properties")]
    NameNotPresent,

    #[error("user id {0} is already in use")]
    IdInUse(u64),

    #[error("user name `{0}` is already in use")]
    NameInUse(String),

    #[error("transport closed during synchronization")]
    ConnectionClosed,

    #[error("peer cancelled the synchronization")]
    SenderCancelled,

    #[error("local close aborted an inbound synchronization")]
    ReceiverCancelled,

    #[error("`sync-begin` received after synchronization counters were already initialized")]
    UnexpectedBeginOfSync,

    #[error("`sync-begin` is missing its `num-messages` attribute")]
    NumMessagesMissing,

    #[error("`sync-end` received before the expected number of body messages arrived")]
    UnexpectedEndOfSync,

    #[error("body message received before `sync-begin`")]
    ExpectedBeginOfSync,

    #[error("expected `sync-end`, a different message arrived in the final position")]
    ExpectedEndOfSync,

    #[error("synchronization failed: {0}")]
    Failed(String),
}

impl SessionError {
    /// The `domain` attribute value used for every `sync-error` this crate sends.
    pub const DOMAIN: &'static str = "session-sync";

    /// Stable wire code for this error kind, carried in a `sync-error` node's `code` attribute.
    pub fn code(&self) -> u32 {
        match self {
            SessionError::UnexpectedNode => 0,
            SessionError::IdNotPresent => 1,
            SessionError::NameNotPresent => 2,
            SessionError::IdInUse(_) => 3,
            SessionError::NameInUse(_) => 4,
            SessionError::ConnectionClosed => 5,
            SessionError::SenderCancelled => 6,
            SessionError::ReceiverCancelled => 7,
            SessionError::UnexpectedBeginOfSync => 8,
            SessionError::NumMessagesMissing => 9,
            SessionError::UnexpectedEndOfSync => 10,
            SessionError::ExpectedBeginOfSync => 11,
            SessionError::ExpectedEndOfSync => 12,
            SessionError::Failed(_) => 13,
        }
    }

    /// Reconstruct an error from a `sync-error` node's `domain` and `code` attributes.
    ///
    /// Codes carrying a payload (`IdInUse`, `NameInUse`) can't be reconstructed faithfully from
    /// a bare code, since the wire attributes only ever specify `domain`+`code`; those collapse
    /// to a zeroed placeholder rather than failing outright, since the receiving side only ever
    /// needs the error *kind* to decide how to react.
    pub fn from_domain_and_code(domain: &str, code: u32) -> Self {
        if domain != Self::DOMAIN {
            return SessionError::Failed(format!("unknown error domain `{domain}` (code {code})"));
        }

        match code {
            0 => SessionError::UnexpectedNode,
            1 => SessionError::IdNotPresent,
            2 => SessionError::NameNotPresent,
            3 => SessionError::IdInUse(0),
            4 => SessionError::NameInUse(String::new()),
            5 => SessionError::ConnectionClosed,
            6 => SessionError::SenderCancelled,
            7 => SessionError::ReceiverCancelled,
            8 => SessionError::UnexpectedBeginOfSync,
            9 => SessionError::NumMessagesMissing,
            10 => SessionError::UnexpectedEndOfSync,
            11 => SessionError::ExpectedBeginOfSync,
            12 => SessionError::ExpectedEndOfSync,
            _ => SessionError::Failed(format!("unrecognized session-sync error code {code}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_round_trips_through_domain_and_code() {
        for error in [
            SessionError::UnexpectedNode,
            SessionError::IdNotPresent,
            SessionError::ConnectionClosed,
            SessionError::SenderCancelled,
            SessionError::ReceiverCancelled,
            SessionError::UnexpectedBeginOfSync,
            SessionError::NumMessagesMissing,
            SessionError::UnexpectedEndOfSync,
            SessionError::ExpectedBeginOfSync,
            SessionError::ExpectedEndOfSync,
        ] {
            let code = error.code();
            let reconstructed = SessionError::from_domain_and_code(SessionError::DOMAIN, code);
            assert_eq!(reconstructed, error);
        }
    }

    #[test]
    fn unknown_domain_becomes_generic_failure() {
        let error = SessionError::from_domain_and_code("some-other-domain", 3);
        assert_matches::assert_matches!(error, SessionError::Failed(_));
    }
}
