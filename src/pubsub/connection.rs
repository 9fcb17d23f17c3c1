use std::time::Duration;

use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Reconnecting { backoff_until: Instant },
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    /// socket closed or errored while connected
    Lost,
    ConnectFailed,
    /// every handle of the manager is gone
    Shutdown,
}

impl ConnectionState {
    /// The first connect attempt happens right away
    pub fn initial(now: Instant) -> Self {
        Self::Reconnecting { backoff_until: now }
    }

    pub fn transition(self, event: ConnectionEvent, now: Instant, backoff: Duration) -> Self {
        match (self, event) {
            (Self::Closed, _) | (_, ConnectionEvent::Shutdown) => Self::Closed,
            (_, ConnectionEvent::Opened) => Self::Connected,
            (Self::Connected, ConnectionEvent::Lost | ConnectionEvent::ConnectFailed) => {
                Self::Reconnecting {
                    backoff_until: now + backoff,
                }
            }
            (Self::Reconnecting { .. }, ConnectionEvent::ConnectFailed) => Self::Reconnecting {
                backoff_until: now + backoff,
            },
            // already backing off
            (Self::Reconnecting { backoff_until }, ConnectionEvent::Lost) => {
                Self::Reconnecting { backoff_until }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BACKOFF: Duration = Duration::from_secs(5);

    #[test]
    fn lost_connection_backs_off() {
        let now = Instant::now();
        let state = ConnectionState::Connected.transition(ConnectionEvent::Lost, now, BACKOFF);

        assert_eq!(
            state,
            ConnectionState::Reconnecting {
                backoff_until: now + BACKOFF
            }
        );
        assert_eq!(
            state.transition(ConnectionEvent::Opened, now + BACKOFF, BACKOFF),
            ConnectionState::Connected
        );
    }

    #[test]
    fn failed_connect_backs_off_again() {
        let now = Instant::now();
        let later = now + Duration::from_secs(1);
        let state = ConnectionState::initial(now);

        assert_eq!(
            state.transition(ConnectionEvent::ConnectFailed, later, BACKOFF),
            ConnectionState::Reconnecting {
                backoff_until: later + BACKOFF
            }
        );
        assert_eq!(
            state.transition(ConnectionEvent::Lost, later, BACKOFF),
            ConnectionState::Reconnecting { backoff_until: now }
        );
    }

    #[test]
    fn closed_is_final() {
        let now = Instant::now();
        let closed = ConnectionState::Connected.transition(ConnectionEvent::Shutdown, now, BACKOFF);

        assert_eq!(closed, ConnectionState::Closed);
        assert_eq!(
            closed.transition(ConnectionEvent::Opened, now, BACKOFF),
            ConnectionState::Closed
        );
    }
}
