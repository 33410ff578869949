use chrono::TimeDelta;
use clap::Parser;

use crate::{
    core::{
        cycle::DemandSettings,
        demand::{DailyAverage, DemandForecastProvider, HourlyProfile},
    },
    prelude::*,
    quantity::energy::KilowattHours,
};

#[derive(Parser)]
pub struct DemandArgs {
    /// Household consumption power sensor.
    #[clap(
        long = "consumption-entity-id",
        env = "CONSUMPTION_ENTITY_ID",
        default_value = "sensor.solarnet_power_load_consumed"
    )]
    entity_id: String,

    /// How far back to look into the consumption history.
    #[clap(long = "demand-history", env = "DEMAND_HISTORY", default_value = "30d")]
    history: humantime::Duration,

    #[clap(long = "demand-model", env = "DEMAND_MODEL", default_value = "hourly-profile")]
    model: DemandModel,

    /// Next-day consumption assumed when the history is insufficient.
    #[clap(long = "fallback-demand-kwh", env = "FALLBACK_DEMAND_KWH", default_value = "20")]
    fallback: KilowattHours,

    #[clap(long = "demand-min-samples", env = "DEMAND_MIN_SAMPLES", default_value = "48")]
    min_samples: usize,

    /// Longer intervals between the samples are not integrated.
    #[clap(long = "demand-max-gap", env = "DEMAND_MAX_GAP", default_value = "2h")]
    max_gap: humantime::Duration,

    /// Weight multiplier per day of age.
    #[clap(long = "demand-recency-decay", env = "DEMAND_RECENCY_DECAY", default_value = "0.9")]
    recency_decay: f64,

    /// Extra weight of the same weekday.
    #[clap(long = "demand-weekday-weight", env = "DEMAND_WEEKDAY_WEIGHT", default_value = "1.5")]
    weekday_weight: f64,
}

#[derive(Copy, Clone, Debug, clap::ValueEnum)]
pub enum DemandModel {
    /// Recency- and weekday-weighted hourly profile.
    HourlyProfile,

    /// Plain average power.
    DailyAverage,
}

impl DemandArgs {
    pub fn settings(&self) -> Result<DemandSettings> {
        Ok(DemandSettings {
            entity_id: self.entity_id.clone(),
            history: TimeDelta::from_std(self.history.into())?,
            fallback: self.fallback,
        })
    }

    pub fn provider(&self) -> Result<Box<dyn DemandForecastProvider>> {
        ensure!(
            self.recency_decay > 0.0 && self.recency_decay <= 1.0,
            "recency decay must be within (0, 1]",
        );
        let max_gap = TimeDelta::from_std(self.max_gap.into())?;
        Ok(match self.model {
            DemandModel::HourlyProfile => Box::new(HourlyProfile {
                min_samples: self.min_samples,
                max_gap,
                recency_decay: self.recency_decay,
                weekday_weight: self.weekday_weight,
            }),
            DemandModel::DailyAverage => {
                Box::new(DailyAverage { min_samples: self.min_samples, max_gap })
            }
        })
    }
}
