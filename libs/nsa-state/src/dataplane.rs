//! Data-plane "state" (spec §3, §4.2): not an FSM, a tuple `(active,
//! version, consistent)`. `active` toggles at activation and teardown.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DataPlaneStatus {
    pub active: bool,
    pub version: u64,
    pub consistent: bool,
}

impl DataPlaneStatus {
    pub fn activate(self) -> DataPlaneStatus {
        DataPlaneStatus {
            active: true,
            version: self.version + 1,
            consistent: true,
        }
    }

    pub fn deactivate(self) -> DataPlaneStatus {
        DataPlaneStatus {
            active: false,
            version: self.version + 1,
            consistent: true,
        }
    }
}
