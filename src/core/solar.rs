use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::{
    core::cache::Entries,
    db::state::{State, StateId},
    prelude::*,
    quantity::{energy::KilowattHours, power::Kilowatts},
};

/// Hourly weather of the target day as returned by the weather collaborator.
#[must_use]
#[derive(Clone, Debug)]
pub struct WeatherDay {
    pub date: NaiveDate,
    pub hourly: Vec<HourlyWeather>,
    pub sunrise: Option<NaiveTime>,
    pub sunset: Option<NaiveTime>,
}

#[derive(Copy, Clone, Debug)]
pub struct HourlyWeather {
    pub hour: u32,

    /// Global horizontal irradiance, W/m², averaged over the hour *preceding* `hour`.
    pub shortwave_radiation: Option<f64>,

    /// Percent.
    pub cloud_cover: Option<f64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HourlyRadiation {
    pub hour: u32,
    pub watts_per_square_meter: f64,
}

#[must_use]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolarForecast {
    pub energy: KilowattHours,
    pub derating: f64,
    pub hourly_radiation: Vec<HourlyRadiation>,
    pub sunrise: Option<NaiveTime>,
    pub sunset: Option<NaiveTime>,
}

impl State for Entries<SolarForecast> {
    const ID: StateId = StateId::SolarForecasts;
}

/// Converts the radiation forecast into the expected PV yield.
#[must_use]
#[derive(Copy, Clone, Debug)]
pub struct SolarForecastProvider {
    pub system_size: Kilowatts,

    /// Derate overcast days.
    pub cloud_derating: bool,
}

impl SolarForecastProvider {
    /// Radiation at which the array produces its nominal power.
    const STANDARD_IRRADIANCE: f64 = 1000.0;

    const OVERCAST_CLOUD_COVER: f64 = 80.0;
    const OVERCAST_DERATING: f64 = 0.7;

    #[instrument(skip_all, fields(date = %day.date))]
    pub fn forecast(&self, day: &WeatherDay) -> SolarForecast {
        let hourly_radiation: Vec<HourlyRadiation> = day
            .hourly
            .iter()
            .map(|weather| HourlyRadiation {
                hour: weather.hour,
                watts_per_square_meter: weather.shortwave_radiation.unwrap_or_default().max(0.0),
            })
            .collect();
        let derating = self.derating(day);
        let energy: KilowattHours = hourly_radiation
            .iter()
            .map(|radiation| {
                let fraction = daylight_fraction(radiation.hour, day.sunrise, day.sunset);
                KilowattHours(
                    radiation.watts_per_square_meter / Self::STANDARD_IRRADIANCE
                        * self.system_size.0
                        * fraction,
                )
            })
            .sum::<KilowattHours>()
            * derating;
        info!(energy = ?energy, derating, sunrise = ?day.sunrise, sunset = ?day.sunset, "forecasted");
        SolarForecast { energy, derating, hourly_radiation, sunrise: day.sunrise, sunset: day.sunset }
    }

    fn derating(&self, day: &WeatherDay) -> f64 {
        if !self.cloud_derating {
            return 1.0;
        }
        let cloud_covers: Vec<f64> = day.hourly.iter().filter_map(|hour| hour.cloud_cover).collect();
        if cloud_covers.is_empty() {
            return 1.0;
        }
        #[expect(clippy::cast_precision_loss)]
        let mean_cloud_cover = cloud_covers.iter().sum::<f64>() / cloud_covers.len() as f64;
        debug!(mean_cloud_cover);
        if mean_cloud_cover > Self::OVERCAST_CLOUD_COVER { Self::OVERCAST_DERATING } else { 1.0 }
    }
}

/// Share of the hour ending at `hour` that lies between sunrise and sunset.
///
/// Every hour counts as daylight when the sun times are unknown.
fn daylight_fraction(hour: u32, sunrise: Option<NaiveTime>, sunset: Option<NaiveTime>) -> f64 {
    let (Some(sunrise), Some(sunset)) = (sunrise, sunset) else {
        return 1.0;
    };
    if sunset <= sunrise {
        return 1.0;
    }
    let end = i64::from(hour) * 3600;
    let start = end - 3600;
    let overlap = end.min(i64::from(sunset.num_seconds_from_midnight()))
        - start.max(i64::from(sunrise.num_seconds_from_midnight()));
    #[expect(clippy::cast_precision_loss)]
    let fraction = overlap.max(0) as f64 / 3600.0;
    fraction
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn time(hour: u32, minute: u32) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(hour, minute, 0)
    }

    fn day(radiation: impl Fn(u32) -> Option<f64>, cloud_cover: f64) -> WeatherDay {
        WeatherDay {
            date: NaiveDate::from_ymd_opt(2025, 6, 11).unwrap(),
            hourly: (0..24)
                .map(|hour| HourlyWeather {
                    hour,
                    shortwave_radiation: radiation(hour),
                    cloud_cover: Some(cloud_cover),
                })
                .collect(),
            sunrise: time(6, 0),
            sunset: time(18, 0),
        }
    }

    fn provider(cloud_derating: bool) -> SolarForecastProvider {
        SolarForecastProvider { system_size: Kilowatts(4.0), cloud_derating }
    }

    #[test]
    fn flat_daylight_radiation() {
        let forecast = provider(false).forecast(&day(|_| Some(500.0), 0.0));
        assert_abs_diff_eq!(forecast.energy.0, 24.0, epsilon = 1e-9);
        assert_eq!(forecast.hourly_radiation.len(), 24);
    }

    #[test]
    fn night_radiation_is_ignored() {
        let forecast = provider(false).forecast(&day(|hour| (hour == 3).then_some(800.0), 0.0));
        assert_abs_diff_eq!(forecast.energy.0, 0.0);
    }

    #[test]
    fn missing_hours_count_as_zero() {
        let forecast = provider(false)
            .forecast(&day(|hour| if hour == 12 { None } else { Some(1000.0) }, 0.0));
        assert_abs_diff_eq!(forecast.energy.0, 11.0 * 4.0, epsilon = 1e-9);
    }

    #[test]
    fn sunrise_hour_is_partial() {
        let mut day = day(|hour| (hour == 7).then_some(1000.0), 0.0);
        day.sunrise = time(6, 30);
        let forecast = provider(false).forecast(&day);
        assert_abs_diff_eq!(forecast.energy.0, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn radiation_covers_preceding_hour() {
        let day = day(|hour| (7..=18).contains(&hour).then_some(1000.0), 0.0);
        let provider = SolarForecastProvider { system_size: Kilowatts(1.0), cloud_derating: false };
        assert_abs_diff_eq!(provider.forecast(&day).energy.0, 12.0, epsilon = 1e-9);
    }

    #[test]
    fn sunrise_stamp_is_still_night() {
        let forecast = provider(false).forecast(&day(|hour| (hour == 6).then_some(1000.0), 0.0));
        assert_abs_diff_eq!(forecast.energy.0, 0.0);
    }

    #[test]
    fn unknown_sun_times() {
        let mut day = day(|hour| (hour == 3).then_some(100.0), 0.0);
        day.sunrise = None;
        let forecast = provider(false).forecast(&day);
        assert_abs_diff_eq!(forecast.energy.0, 0.4, epsilon = 1e-9);
    }

    #[test]
    fn overcast_day_is_derated() {
        let forecast = provider(true).forecast(&day(|_| Some(500.0), 90.0));
        assert_abs_diff_eq!(forecast.derating, 0.7);
        assert_abs_diff_eq!(forecast.energy.0, 24.0 * 0.7, epsilon = 1e-9);
    }

    #[test]
    fn cloudy_but_not_overcast() {
        let forecast = provider(true).forecast(&day(|_| Some(500.0), 80.0));
        assert_abs_diff_eq!(forecast.derating, 1.0);
    }
}
