//! Reservation state machine (spec §4.2).
//!
//! `RESERVE_CHECKING` doubles as a per-connection mutual-exclusion token:
//! whoever transitions a connection into it is expected to hold that
//! connection's lock until leaving the state (enforced by callers —
//! `nsa-aggregator` and `nsa-backend` — not by this enum itself).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationState {
    ReserveStart,
    ReserveChecking,
    ReserveHeld,
    ReserveCommitting,
    ReserveAborting,
    ReserveFailed,
}

impl ReservationState {
    /// Validates one of the legal transitions listed in spec §4.2.
    /// Returns the target state, or an error describing the illegal
    /// input.
    pub fn transition(self, to: ReservationState) -> Result<ReservationState, (ReservationState, ReservationState)> {
        use ReservationState::*;
        let legal = matches!(
            (self, to),
            (ReserveStart, ReserveChecking)
                | (ReserveChecking, ReserveHeld)
                | (ReserveChecking, ReserveFailed)
                | (ReserveHeld, ReserveCommitting)
                | (ReserveCommitting, ReserveStart)
                | (ReserveHeld, ReserveAborting)
                | (ReserveAborting, ReserveStart)
        );
        if legal {
            Ok(to)
        } else {
            Err((self, to))
        }
    }
}

impl Default for ReservationState {
    fn default() -> Self {
        ReservationState::ReserveStart
    }
}

#[cfg(test)]
mod tests {
    use super::ReservationState::*;

    #[test]
    fn commit_path_is_legal() {
        assert!(ReserveStart.transition(ReserveChecking).is_ok());
        assert!(ReserveChecking.transition(ReserveHeld).is_ok());
        assert!(ReserveHeld.transition(ReserveCommitting).is_ok());
        assert!(ReserveCommitting.transition(ReserveStart).is_ok());
    }

    #[test]
    fn abort_path_is_legal() {
        assert!(ReserveHeld.transition(ReserveAborting).is_ok());
        assert!(ReserveAborting.transition(ReserveStart).is_ok());
    }

    #[test]
    fn checking_can_terminate_in_failure() {
        assert!(ReserveChecking.transition(ReserveFailed).is_ok());
    }

    #[test]
    fn skipping_checking_is_illegal() {
        assert!(ReserveStart.transition(ReserveHeld).is_err());
    }

    #[test]
    fn failed_is_terminal_for_the_attempt() {
        assert!(ReserveFailed.transition(ReserveStart).is_err());
    }
}
