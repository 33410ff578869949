use clap::Parser;

use crate::{
    api::{modbus, retry::RetryPolicy},
    core::{
        controller::RateLimits,
        inverter::{RateSign, RegisterMap},
    },
    quantity::power::Watts,
};

/// Defaults match the Fronius Gen24 storage control.
#[derive(Parser)]
pub struct InverterArgs {
    /// Inverter Modbus endpoint: `modbus+tcp://host[:port]/slave-id`.
    #[clap(long = "inverter-url", env = "INVERTER_URL")]
    endpoint: modbus::Endpoint,

    #[clap(long = "mode-register", env = "MODE_REGISTER", default_value = "40348")]
    mode_register: u16,

    #[clap(long = "rate-register", env = "RATE_REGISTER", default_value = "40355")]
    rate_register: u16,

    #[clap(long = "normal-mode-value", env = "NORMAL_MODE_VALUE", default_value = "0")]
    normal_mode_value: u16,

    #[clap(long = "force-charge-mode-value", env = "FORCE_CHARGE_MODE_VALUE", default_value = "2")]
    force_charge_mode_value: u16,

    /// Charge rate register resolution.
    #[clap(long = "watts-per-unit", env = "WATTS_PER_UNIT", default_value = "10")]
    watts_per_unit: f64,

    /// Sign of the charging rate in the rate register.
    #[clap(long = "rate-sign", env = "RATE_SIGN", default_value = "negative")]
    rate_sign: RateSign,

    #[clap(
        long = "max-battery-charge-rate-watts",
        env = "MAX_BATTERY_CHARGE_RATE",
        default_value = "5000"
    )]
    pub max_charge_rate: Watts,

    /// Smaller rate changes are not written.
    #[clap(long = "rate-tolerance-watts", env = "RATE_TOLERANCE_WATTS", default_value = "50")]
    rate_tolerance: Watts,
}

impl InverterArgs {
    pub fn client(&self, retry: RetryPolicy) -> modbus::Client {
        modbus::Client::new(self.endpoint.clone(), retry)
    }

    pub const fn registers(&self) -> RegisterMap {
        RegisterMap {
            mode: self.mode_register,
            rate: self.rate_register,
            normal_mode: self.normal_mode_value,
            force_charge_mode: self.force_charge_mode_value,
            watts_per_unit: self.watts_per_unit,
            rate_sign: self.rate_sign,
        }
    }

    pub const fn limits(&self) -> RateLimits {
        RateLimits { max_charge_rate: self.max_charge_rate, tolerance: self.rate_tolerance }
    }
}
