//! Lifecycle state machine (spec §4.2): `INITIAL -> CREATED ->
//! TERMINATING -> TERMINATED`; a connection may enter `TERMINATED` from
//! any prior state (e.g. on end-time expiry).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Initial,
    Created,
    Terminating,
    Terminated,
}

impl LifecycleState {
    pub fn transition(self, to: LifecycleState) -> Result<LifecycleState, (LifecycleState, LifecycleState)> {
        use LifecycleState::*;
        let legal = matches!(
            (self, to),
            (Initial, Created)
                | (Created, Terminating)
                | (Terminating, Terminated)
                | (Initial, Terminated)
                | (Created, Terminated)
        );
        if legal {
            Ok(to)
        } else {
            Err((self, to))
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Terminated)
    }
}

impl Default for LifecycleState {
    fn default() -> Self {
        LifecycleState::Initial
    }
}

#[cfg(test)]
mod tests {
    use super::LifecycleState::*;

    #[test]
    fn normal_path_is_legal() {
        assert!(Initial.transition(Created).is_ok());
        assert!(Created.transition(Terminating).is_ok());
        assert!(Terminating.transition(Terminated).is_ok());
    }

    #[test]
    fn terminated_reachable_from_any_prior_state() {
        assert!(Initial.transition(Terminated).is_ok());
        assert!(Created.transition(Terminated).is_ok());
    }

    #[test]
    fn terminated_is_terminal() {
        assert!(Terminated.transition(Initial).is_err());
        assert!(Terminated.is_terminal());
    }
}
