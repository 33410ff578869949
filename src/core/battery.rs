use chrono::{DateTime, Local};
use serde::Serialize;

use crate::quantity::{energy::KilowattHours, power::Watts, proportions::Percent};

/// Battery reading taken at the start of the cycle.
#[must_use]
#[derive(Copy, Clone, Debug, Serialize)]
pub struct BatterySnapshot {
    pub state_of_charge: Percent,

    /// Positive while charging.
    pub charge_rate: Watts,

    pub timestamp: DateTime<Local>,
}

impl BatterySnapshot {
    pub fn is_charging(&self) -> bool {
        self.charge_rate > Watts::ZERO
    }

    pub fn stored_energy(&self, battery_size: KilowattHours) -> KilowattHours {
        battery_size * self.state_of_charge
    }

    /// Energy above the minimum state of charge, never negative.
    pub fn usable_energy(&self, battery_size: KilowattHours, minimum_soc: Percent) -> KilowattHours {
        (battery_size * (self.state_of_charge - minimum_soc)).max(KilowattHours::ZERO)
    }
}
