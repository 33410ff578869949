use chrono::Timelike;
use serde::Serialize;

use crate::{
    core::{battery::BatterySnapshot, config::SystemConfig, forecast::ForecastResult},
    prelude::*,
    quantity::{energy::KilowattHours, power::Watts},
};

#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct DeficitDecision {
    /// Demand not covered by the solar yield and the usable battery energy.
    pub deficit: KilowattHours,

    /// Energy missing to reach the minimum state of charge by sunset.
    pub sunset_shortfall: KilowattHours,

    pub should_charge_overnight: bool,

    pub required_charge_rate: Watts,
}

impl DeficitDecision {
    /// Energy to put into the battery to satisfy both triggers.
    pub fn required_energy(&self) -> KilowattHours {
        self.deficit.max(self.sunset_shortfall)
    }

    pub const fn with_required_charge_rate(mut self, rate: Watts) -> Self {
        self.required_charge_rate = rate;
        self
    }
}

#[instrument(skip_all, fields(date = %forecast.date))]
pub fn compute(
    forecast: &ForecastResult,
    battery: &BatterySnapshot,
    config: &SystemConfig,
) -> DeficitDecision {
    let usable_energy = battery.usable_energy(config.battery_size, config.minimum_soc);
    let solar_energy = forecast.solar * config.charge_efficiency;
    let net_available = solar_energy + usable_energy;
    let deficit = (forecast.demand - net_available).max(KilowattHours::ZERO);

    let sunset_shortfall = forecast.sunset.map_or(KilowattHours::ZERO, |sunset| {
        let day_share = f64::from(sunset.num_seconds_from_midnight()) / 86400.0;
        let projected = (battery.stored_energy(config.battery_size) + solar_energy
            - forecast.demand * day_share)
            .clamp(KilowattHours::ZERO, config.battery_size);
        let floor = config.battery_size * config.minimum_soc_by_sunset;
        debug!(projected = ?projected, floor = ?floor, "projected energy by sunset");
        (floor - projected).max(KilowattHours::ZERO)
    });

    let should_charge_overnight =
        deficit > KilowattHours::ZERO || sunset_shortfall > KilowattHours::ZERO;
    info!(
        usable_energy = ?usable_energy,
        net_available = ?net_available,
        deficit = ?deficit,
        sunset_shortfall = ?sunset_shortfall,
        should_charge_overnight,
        "computed",
    );
    DeficitDecision {
        deficit,
        sunset_shortfall,
        should_charge_overnight,
        required_charge_rate: Watts::ZERO,
    }
}
