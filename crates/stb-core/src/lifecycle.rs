//! Connection lifecycle: a pure decision function over `connection.update`.
//!
//! The supervisor owns the reconnect loop and executes the returned
//! [`LifecycleAction`]; nothing here performs I/O.

use crate::messaging::types::{ConnectionPhase, ConnectionUpdate};

/// Why the transport closed the connection (Baileys `DisconnectReason`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    ConnectionClosed,
    ConnectionLost,
    ConnectionReplaced,
    LoggedOut,
    BadSession,
    RestartRequired,
    MultideviceMismatch,
    Forbidden,
    UnavailableService,
    Unknown(u16),
}

impl DisconnectReason {
    pub fn from_status_code(code: u16) -> Self {
        match code {
            401 => Self::LoggedOut,
            403 => Self::Forbidden,
            // Baileys uses 408 for both `connectionLost` and `timedOut`.
            408 => Self::ConnectionLost,
            411 => Self::MultideviceMismatch,
            428 => Self::ConnectionClosed,
            440 => Self::ConnectionReplaced,
            500 => Self::BadSession,
            503 => Self::UnavailableService,
            515 => Self::RestartRequired,
            other => Self::Unknown(other),
        }
    }

    /// Only an explicit logout ends the session for good.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::LoggedOut)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed { reason: Option<DisconnectReason> },
}

/// What the supervisor must do after an update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleAction {
    None,
    /// Connection established; tell the operator.
    AnnounceOpen,
    /// Start a fresh connection sequence (exactly one per close).
    Reconnect,
    /// Logged out: stop, the operator has to re-authenticate.
    Terminate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub state: ConnectionState,
    pub action: LifecycleAction,
}

/// Decide the next state and action for `update` received in `state`.
///
/// QR payloads are deliberately ignored here: rendering a challenge never
/// changes the lifecycle.
pub fn transition(state: ConnectionState, update: &ConnectionUpdate) -> Transition {
    match update.connection {
        None => Transition {
            state,
            action: LifecycleAction::None,
        },
        Some(ConnectionPhase::Connecting) => Transition {
            state: ConnectionState::Connecting,
            action: LifecycleAction::None,
        },
        Some(ConnectionPhase::Open) => Transition {
            state: ConnectionState::Open,
            action: LifecycleAction::AnnounceOpen,
        },
        Some(ConnectionPhase::Close) => {
            let reason = update
                .disconnect_status
                .map(DisconnectReason::from_status_code);
            let action = if reason.is_some_and(DisconnectReason::is_terminal) {
                LifecycleAction::Terminate
            } else {
                LifecycleAction::Reconnect
            };
            Transition {
                state: ConnectionState::Closed { reason },
                action,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(status: Option<u16>) -> ConnectionUpdate {
        ConnectionUpdate {
            connection: Some(ConnectionPhase::Close),
            disconnect_status: status,
            qr: None,
        }
    }

    #[test]
    fn logged_out_terminates() {
        let t = transition(ConnectionState::Open, &close(Some(401)));
        assert_eq!(t.action, LifecycleAction::Terminate);
        assert_eq!(
            t.state,
            ConnectionState::Closed {
                reason: Some(DisconnectReason::LoggedOut)
            }
        );
    }

    #[test]
    fn every_other_close_reconnects() {
        for code in [403, 408, 411, 428, 440, 500, 503, 515, 999] {
            let t = transition(ConnectionState::Open, &close(Some(code)));
            assert_eq!(t.action, LifecycleAction::Reconnect, "status {code}");
        }
        let t = transition(ConnectionState::Connecting, &close(None));
        assert_eq!(t.action, LifecycleAction::Reconnect);
        assert_eq!(t.state, ConnectionState::Closed { reason: None });
    }

    #[test]
    fn open_is_announced() {
        let t = transition(
            ConnectionState::Connecting,
            &ConnectionUpdate {
                connection: Some(ConnectionPhase::Open),
                ..Default::default()
            },
        );
        assert_eq!(t.state, ConnectionState::Open);
        assert_eq!(t.action, LifecycleAction::AnnounceOpen);
    }

    #[test]
    fn qr_only_update_keeps_state() {
        let t = transition(
            ConnectionState::Connecting,
            &ConnectionUpdate {
                qr: Some("2@abc".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(t.state, ConnectionState::Connecting);
        assert_eq!(t.action, LifecycleAction::None);
    }

    #[test]
    fn status_codes_map_to_reasons() {
        assert_eq!(
            DisconnectReason::from_status_code(515),
            DisconnectReason::RestartRequired
        );
        assert_eq!(
            DisconnectReason::from_status_code(440),
            DisconnectReason::ConnectionReplaced
        );
        assert_eq!(
            DisconnectReason::from_status_code(418),
            DisconnectReason::Unknown(418)
        );
        assert!(!DisconnectReason::BadSession.is_terminal());
    }
}
