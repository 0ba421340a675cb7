//! Provision state machine (spec §4.2): `RELEASED <-> PROVISIONING <->
//! PROVISIONED <-> RELEASING <-> RELEASED`, with `Scheduled` as the
//! implicit pre-state of `Provisioned` meaning "committed but before
//! start_time".

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisionState {
    Released,
    Provisioning,
    Scheduled,
    Provisioned,
    Releasing,
}

impl ProvisionState {
    pub fn transition(self, to: ProvisionState) -> Result<ProvisionState, (ProvisionState, ProvisionState)> {
        use ProvisionState::*;
        let legal = matches!(
            (self, to),
            (Released, Provisioning)
                | (Provisioning, Scheduled)
                | (Scheduled, Provisioned)
                | (Scheduled, Releasing)
                | (Provisioned, Releasing)
                | (Releasing, Released)
        );
        if legal {
            Ok(to)
        } else {
            Err((self, to))
        }
    }
}

impl Default for ProvisionState {
    fn default() -> Self {
        ProvisionState::Released
    }
}

#[cfg(test)]
mod tests {
    use super::ProvisionState::*;

    #[test]
    fn full_cycle_is_legal() {
        assert!(Released.transition(Provisioning).is_ok());
        assert!(Provisioning.transition(Scheduled).is_ok());
        assert!(Scheduled.transition(Provisioned).is_ok());
        assert!(Provisioned.transition(Releasing).is_ok());
        assert!(Releasing.transition(Released).is_ok());
    }

    #[test]
    fn release_before_activation_is_legal() {
        assert!(Scheduled.transition(Releasing).is_ok());
    }

    #[test]
    fn cannot_skip_scheduled() {
        assert!(Provisioning.transition(Provisioned).is_err());
    }
}
