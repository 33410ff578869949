use chrono::{DateTime, Local, NaiveDate, NaiveTime};

use crate::{core::solar::HourlyRadiation, quantity::energy::KilowattHours};

/// Solar and demand forecast of the target day.
#[must_use]
#[derive(Clone, Debug)]
pub struct ForecastResult {
    pub date: NaiveDate,
    pub solar: KilowattHours,
    pub demand: KilowattHours,
    pub hourly_radiation: Vec<HourlyRadiation>,
    pub sunset: Option<NaiveTime>,
    pub generated_at: DateTime<Local>,
}
