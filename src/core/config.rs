use bon::Builder;
use chrono::TimeDelta;

use crate::{
    core::{error::ConfigInvalid, window::CheapWindow},
    quantity::{
        energy::KilowattHours,
        power::{Kilowatts, Watts},
        proportions::Percent,
    },
};

/// Installation parameters, immutable for the run.
#[must_use]
#[derive(Copy, Clone, Debug, Builder)]
pub struct SystemConfig {
    /// Nominal PV array power.
    pub system_size: Kilowatts,

    pub battery_size: KilowattHours,

    /// State of charge the battery is never discharged below.
    pub minimum_soc: Percent,

    /// State of charge the battery should still hold at sunset.
    pub minimum_soc_by_sunset: Percent,

    pub cheap_window: CheapWindow,

    pub max_charge_rate: Watts,

    /// Round-trip charge efficiency, `(0, 1]`.
    pub charge_efficiency: f64,

    pub forecast_cache_ttl: TimeDelta,
}

impl SystemConfig {
    pub fn validate(self) -> Result<Self, ConfigInvalid> {
        let checks = [
            (
                [
                    self.max_charge_rate.0,
                    self.battery_size.0,
                    self.system_size.0,
                    self.minimum_soc.0,
                    self.minimum_soc_by_sunset.0,
                    self.charge_efficiency,
                ]
                .into_iter()
                .all(f64::is_finite),
                "all the numbers must be finite",
            ),
            (self.max_charge_rate > Watts::ZERO, "maximum charge rate must be positive"),
            (self.battery_size > KilowattHours::ZERO, "battery size must be positive"),
            (self.system_size >= Kilowatts::ZERO, "system size must not be negative"),
            (
                Percent::ZERO <= self.minimum_soc
                    && self.minimum_soc <= self.minimum_soc_by_sunset
                    && self.minimum_soc_by_sunset <= Percent(100.0),
                "expected 0 ≤ minimum SoC ≤ minimum SoC by sunset ≤ 100",
            ),
            (
                self.charge_efficiency > 0.0 && self.charge_efficiency <= 1.0,
                "charge efficiency must be within (0, 1]",
            ),
            (self.cheap_window.start != self.cheap_window.end, "cheap window must not be empty"),
            (self.forecast_cache_ttl >= TimeDelta::zero(), "cache TTL must not be negative"),
        ];
        match checks.into_iter().find(|(is_valid, _)| !is_valid) {
            Some((_, message)) => Err(ConfigInvalid(message.to_string())),
            None => Ok(self),
        }
    }
}

#[cfg(test)]
impl SystemConfig {
    /// 5 kW array with a 20 kWh battery and a 00:00–06:00 window.
    pub fn sample() -> Self {
        use chrono::NaiveTime;

        Self::builder()
            .system_size(Kilowatts(5.0))
            .battery_size(KilowattHours(20.0))
            .minimum_soc(Percent(20.0))
            .minimum_soc_by_sunset(Percent(20.0))
            .cheap_window(CheapWindow::new(
                NaiveTime::MIN,
                NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            ))
            .max_charge_rate(Watts(5000.0))
            .charge_efficiency(0.95)
            .forecast_cache_ttl(TimeDelta::minutes(120))
            .build()
    }
}
