use std::{collections::BTreeMap, fmt::Debug};

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeDelta, Timelike};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    core::{cache::Entries, error::ForecastError},
    db::state::{State, StateId},
    prelude::*,
    quantity::{energy::KilowattHours, power::Watts},
};

/// Power usage reading, the value holds until the next sample.
#[derive(Copy, Clone, Debug)]
pub struct PowerSample {
    pub timestamp: DateTime<Local>,
    pub power: Watts,
}

#[must_use]
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct DemandEstimate {
    /// Expected consumption over the target day.
    pub energy: KilowattHours,

    /// Share of the hours of day backed by the actual history, `[0, 1]`.
    pub confidence: f64,
}

impl State for Entries<DemandEstimate> {
    const ID: StateId = StateId::DemandForecasts;
}

/// Predicts the next-day consumption from the power usage history.
///
/// The [`Debug`] representation identifies the model and its parameters.
pub trait DemandForecastProvider: Debug + Send + Sync {
    fn predict(
        &self,
        samples: &[PowerSample],
        date: NaiveDate,
    ) -> Result<DemandEstimate, ForecastError>;
}

/// Recency- and weekday-weighted average profile over the hours of day.
#[must_use]
#[derive(Copy, Clone, Debug)]
pub struct HourlyProfile {
    pub min_samples: usize,

    /// Longer intervals between the samples are treated as gaps.
    pub max_gap: TimeDelta,

    /// Weight multiplier per day of age, `(0, 1]`.
    pub recency_decay: f64,

    /// Extra weight of the days falling on the same weekday as the target date.
    pub weekday_weight: f64,
}

impl DemandForecastProvider for HourlyProfile {
    #[instrument(skip_all, fields(date = %date, n_samples = samples.len()))]
    fn predict(
        &self,
        samples: &[PowerSample],
        date: NaiveDate,
    ) -> Result<DemandEstimate, ForecastError> {
        ensure_enough(samples, self.min_samples)?;

        let mut profile = [(0.0, 0.0); 24];
        for ((bucket_date, hour), bucket) in integrate(samples, self.max_gap) {
            let age = (date - bucket_date).num_days().max(1) - 1;
            #[expect(clippy::cast_possible_truncation)]
            let mut weight = self.recency_decay.powi(age as i32) * bucket.coverage();
            if bucket_date.weekday() == date.weekday() {
                weight *= self.weekday_weight;
            }
            let (weighted_sum, total_weight) = &mut profile[hour as usize];
            *weighted_sum += weight * bucket.mean_power().0;
            *total_weight += weight;
        }
        let hourly_power = profile.map(|(weighted_sum, total_weight)| {
            (total_weight > 0.0).then(|| Watts(weighted_sum / total_weight))
        });
        estimate_from_hours(&hourly_power)
    }
}

/// Plain average power over the entire history.
#[must_use]
#[derive(Copy, Clone, Debug)]
pub struct DailyAverage {
    pub min_samples: usize,
    pub max_gap: TimeDelta,
}

impl DemandForecastProvider for DailyAverage {
    #[instrument(skip_all, fields(date = %date, n_samples = samples.len()))]
    fn predict(
        &self,
        samples: &[PowerSample],
        date: NaiveDate,
    ) -> Result<DemandEstimate, ForecastError> {
        ensure_enough(samples, self.min_samples)?;
        let buckets = integrate(samples, self.max_gap);
        let total = buckets.values().fold(Bucket::default(), |total, bucket| Bucket {
            energy: total.energy + bucket.energy,
            duration: total.duration + bucket.duration,
        });
        if total.duration <= TimeDelta::zero() {
            return Err(ForecastError::InsufficientHistory("no usable intervals".to_string()));
        }
        let n_hours = buckets.keys().map(|(_, hour)| *hour).unique().count();
        #[expect(clippy::cast_precision_loss)]
        let confidence = n_hours as f64 / 24.0;
        let energy = total.mean_power() * TimeDelta::days(1);
        info!(energy = ?energy, confidence, "predicted");
        Ok(DemandEstimate { energy, confidence })
    }
}

fn ensure_enough(samples: &[PowerSample], min_samples: usize) -> Result<(), ForecastError> {
    if samples.len() < min_samples {
        return Err(ForecastError::InsufficientHistory(format!(
            "{} samples while at least {min_samples} required",
            samples.len(),
        )));
    }
    Ok(())
}

/// Sum up the hours, filling the hours without history with the mean of the others.
fn estimate_from_hours(hourly_power: &[Option<Watts>; 24]) -> Result<DemandEstimate, ForecastError> {
    let observed = hourly_power.iter().flatten().copied().collect_vec();
    if observed.is_empty() {
        return Err(ForecastError::InsufficientHistory("no usable intervals".to_string()));
    }
    #[expect(clippy::cast_precision_loss)]
    let n_observed = observed.len() as f64;
    let fill = observed.iter().copied().sum::<Watts>() / n_observed;
    let energy = hourly_power
        .iter()
        .map(|power| power.unwrap_or(fill) * TimeDelta::hours(1))
        .sum::<KilowattHours>();
    let confidence = n_observed / 24.0;
    info!(energy = ?energy, confidence, "predicted");
    Ok(DemandEstimate { energy, confidence })
}

#[derive(Copy, Clone, Default)]
struct Bucket {
    energy: KilowattHours,
    duration: TimeDelta,
}

impl Bucket {
    fn mean_power(self) -> Watts {
        Watts::from(self.energy / self.duration)
    }

    /// Share of the hour covered by the samples.
    fn coverage(self) -> f64 {
        (self.duration.as_seconds_f64() / 3600.0).min(1.0)
    }
}

/// Integrate the step-wise power over the calendar hours.
fn integrate(samples: &[PowerSample], max_gap: TimeDelta) -> BTreeMap<(NaiveDate, u32), Bucket> {
    let mut buckets: BTreeMap<(NaiveDate, u32), Bucket> = BTreeMap::new();
    let mut n_gaps = 0_usize;
    let sorted = samples.iter().sorted_by_key(|sample| sample.timestamp);
    for (current, next) in sorted.tuple_windows() {
        let span = next.timestamp - current.timestamp;
        if span <= TimeDelta::zero() {
            continue;
        }
        if span > max_gap {
            n_gaps += 1;
            continue;
        }
        let mut cursor = current.timestamp;
        while cursor < next.timestamp {
            let into_hour = TimeDelta::seconds(i64::from(cursor.minute() * 60 + cursor.second()))
                + TimeDelta::nanoseconds(i64::from(cursor.nanosecond()));
            let boundary = (cursor - into_hour + TimeDelta::hours(1)).min(next.timestamp);
            let bucket = buckets.entry((cursor.date_naive(), cursor.hour())).or_default();
            bucket.energy += current.power * (boundary - cursor);
            bucket.duration += boundary - cursor;
            cursor = boundary;
        }
    }
    if n_gaps != 0 {
        debug!(n_gaps, "skipped the gaps");
    }
    buckets
}
