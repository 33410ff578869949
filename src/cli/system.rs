use chrono::{NaiveTime, TimeDelta};
use clap::Parser;

use crate::{
    core::{
        config::SystemConfig,
        window::{CheapWindow, parse_time},
    },
    prelude::*,
    quantity::{
        energy::KilowattHours,
        power::{Kilowatts, Watts},
        proportions::Percent,
    },
};

#[derive(Parser)]
pub struct SystemArgs {
    /// Nominal PV array power.
    #[clap(long = "system-size-kw", env = "SYSTEM_SIZE_KW")]
    system_size: Kilowatts,

    #[clap(long = "battery-size-kwh", env = "BATTERY_SIZE_KWH")]
    battery_size: KilowattHours,

    /// State of charge the battery is never discharged below.
    #[clap(long = "minimum-soc-percent", env = "MINIMUM_SOC_PERCENT", default_value = "20")]
    minimum_soc: Percent,

    /// State of charge the battery should still hold at sunset.
    #[clap(
        long = "minimum-soc-by-sunset-percent",
        env = "MINIMUM_SOC_BY_SUNSET",
        default_value = "20"
    )]
    minimum_soc_by_sunset: Percent,

    /// Cheap power window start, local time.
    #[clap(long = "cheap-window-start", env = "CHEAP_POWER_WINDOW_START", value_parser = parse_time)]
    cheap_window_start: NaiveTime,

    /// Cheap power window end, local time. May be earlier than the start to wrap midnight.
    #[clap(long = "cheap-window-end", env = "CHEAP_POWER_WINDOW_END", value_parser = parse_time)]
    cheap_window_end: NaiveTime,

    #[clap(
        long = "battery-charge-efficiency-percent",
        env = "BATTERY_CHARGE_EFFICIENCY",
        default_value = "95"
    )]
    charge_efficiency: Percent,

    #[clap(long = "forecast-cache-ttl", env = "FORECAST_CACHE_TTL", default_value = "120m")]
    forecast_cache_ttl: humantime::Duration,
}

impl SystemArgs {
    pub fn config(&self, max_charge_rate: Watts) -> Result<SystemConfig> {
        let config = SystemConfig::builder()
            .system_size(self.system_size)
            .battery_size(self.battery_size)
            .minimum_soc(self.minimum_soc)
            .minimum_soc_by_sunset(self.minimum_soc_by_sunset)
            .cheap_window(CheapWindow::new(self.cheap_window_start, self.cheap_window_end))
            .max_charge_rate(max_charge_rate)
            .charge_efficiency(self.charge_efficiency.to_proportion())
            .forecast_cache_ttl(TimeDelta::from_std(self.forecast_cache_ttl.into())?)
            .build()
            .validate()?;
        info!(?config, "configured");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[derive(Parser)]
    struct TestArgs {
        #[clap(flatten)]
        system: SystemArgs,
    }

    #[test]
    fn config_ok() -> Result {
        let args = TestArgs::try_parse_from([
            "nightjar",
            "--system-size-kw=6.5",
            "--battery-size-kwh=10.2",
            "--cheap-window-start=23:00",
            "--cheap-window-end=06:30",
        ])?;
        let config = args.system.config(Watts(5000.0))?;
        assert_abs_diff_eq!(config.charge_efficiency, 0.95);
        assert_eq!(config.cheap_window.end, NaiveTime::from_hms_opt(6, 30, 0).unwrap());
        assert_eq!(config.forecast_cache_ttl, TimeDelta::minutes(120));
        Ok(())
    }

    #[test]
    fn invalid_soc_fails() -> Result {
        let args = TestArgs::try_parse_from([
            "nightjar",
            "--system-size-kw=6.5",
            "--battery-size-kwh=10.2",
            "--minimum-soc-percent=50",
            "--minimum-soc-by-sunset-percent=30",
            "--cheap-window-start=23:00",
            "--cheap-window-end=06:30",
        ])?;
        assert!(args.system.config(Watts(5000.0)).is_err());
        Ok(())
    }
}
