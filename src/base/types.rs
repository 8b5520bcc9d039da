//! Common types and result handling.

use std::fmt;

/// Error type used throughout the crate.
pub type Err = anyhow::Error;
/// Result with the crate error type.
pub type Res<T> = Result<T, Err>;
/// Result carrying no value.
pub type Void = Res<()>;

/// Outcome of submitting a login code.
///
/// A second-factor challenge is an expected step of the login flow, so it is
/// returned as a value rather than as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignIn {
    /// The code was accepted and the session is logged in.
    Authorized,
    /// The account has a cloud password; it must be checked before the session is usable.
    PasswordRequired {
        /// Password hint set by the account owner, if any.
        hint: Option<String>,
    },
}

/// Lifecycle of a single account session.
///
/// Transitions are strictly linear; a failed login ends the run for that account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, not logged in.
    Unauthenticated,
    /// A login code was requested and the operator is being asked for it.
    AwaitingCode,
    /// The code was accepted but the account also needs its password.
    AwaitingSecondFactor,
    /// Logged in.
    Authenticated,
    /// Handlers are attached and updates are flowing.
    Monitoring,
    /// The session was closed.
    Disconnected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::AwaitingCode => "awaiting-code",
            SessionState::AwaitingSecondFactor => "awaiting-second-factor",
            SessionState::Authenticated => "authenticated",
            SessionState::Monitoring => "monitoring",
            SessionState::Disconnected => "disconnected",
        };

        f.write_str(name)
    }
}
