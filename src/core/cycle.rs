use std::fmt::Display;

use bon::Builder;
use chrono::{DateTime, Local, NaiveDate, TimeDelta};
use itertools::Itertools;

use crate::{
    core::{
        cache::{CacheKey, Fetched, ForecastCache},
        config::SystemConfig,
        controller::InverterController,
        deficit,
        demand::{DemandEstimate, DemandForecastProvider, PowerSample},
        error::ForecastError,
        forecast::ForecastResult,
        inverter::{InverterMode, Target},
        scheduler,
        solar::{SolarForecast, SolarForecastProvider},
        source::{BatterySource, HistorySource, LocationSource, WeatherSource},
        status::{
            Actuation,
            BatteryStatus,
            DecisionStatus,
            DemandOrigin,
            ForecastStatus,
            InverterStatus,
            StatusSnapshot,
            WindowStatus,
        },
    },
    prelude::*,
    quantity::{energy::KilowattHours, power::Watts},
};

#[must_use]
#[derive(Clone, Debug)]
pub struct DemandSettings {
    pub entity_id: String,

    /// Trailing history window.
    pub history: TimeDelta,

    /// Used when the history is insufficient.
    pub fallback: KilowattHours,
}

/// Single decision pass: forecast, decide, actuate, report.
#[must_use]
#[derive(Builder)]
pub struct Cycle<'a> {
    config: &'a SystemConfig,
    now: DateTime<Local>,
    location: &'a dyn LocationSource,
    weather: &'a dyn WeatherSource,
    history: &'a dyn HistorySource,
    battery: &'a dyn BatterySource,
    solar_provider: SolarForecastProvider,
    demand_provider: &'a dyn DemandForecastProvider,
    demand: &'a DemandSettings,
    solar_cache: &'a ForecastCache<SolarForecast>,
    demand_cache: &'a ForecastCache<DemandEstimate>,
}

impl Cycle<'_> {
    /// Run the cycle, actuating only when the controller is given.
    ///
    /// Never fails: the problems end up in [`StatusSnapshot::errors`].
    #[instrument(skip_all, fields(now = %self.now))]
    pub async fn run(self, controller: Option<&mut InverterController<'_>>) -> StatusSnapshot {
        let window = self.config.cheap_window.occurrence(self.now);
        let date = window.end.date_naive();
        info!(?window, %date, "starting the cycle…");

        let (solar, (demand, demand_origin), battery) = tokio::join!(
            self.forecast_solar(date),
            self.forecast_demand(date),
            self.battery.read_battery(),
        );
        let mut errors = Vec::new();
        let solar = note_error(solar.context("solar forecast is unavailable"), &mut errors);
        let battery = note_error(battery.context("failed to read the battery"), &mut errors);

        let mut forecast_status = None;
        let mut decision = None;
        if let (Some(solar), Some(battery)) = (&solar, &battery) {
            let forecast = ForecastResult {
                date,
                solar: solar.value.energy,
                demand: demand.energy,
                hourly_radiation: solar.value.hourly_radiation.clone(),
                sunset: solar.value.sunset,
                generated_at: self.now,
            };
            let deficit_decision = deficit::compute(&forecast, battery, self.config);
            let rate = scheduler::schedule(&deficit_decision, self.now, window, self.config);
            decision = Some(deficit_decision.with_required_charge_rate(rate));
            forecast_status =
                Some(ForecastStatus::new(&forecast, solar.freshness, &demand, demand_origin));
        }

        let (inverter, actuation) = match controller {
            None => {
                info!("scouting, the inverter is left untouched");
                (None, Actuation::Skipped)
            }
            Some(controller) => {
                let target = match &decision {
                    Some(decision) => Some(Target::from_decision(decision, window, self.now)),
                    None if controller.state().mode == InverterMode::ForceCharge
                        && !window.contains(self.now) =>
                    {
                        warn!("no decision, but the window is over, returning to normal…");
                        Some(Target::Normal)
                    }
                    None => None,
                };
                let actuation = match target {
                    None => {
                        warn!("no decision, leaving the inverter as is");
                        Actuation::Held
                    }
                    Some(target) => match controller.apply(target, self.now).await {
                        Ok(transition) => Actuation::Applied { transition },
                        Err(error) => {
                            error!("{error:#}");
                            errors.push(error.to_string());
                            Actuation::Failed { error: error.to_string() }
                        }
                    },
                };
                (Some(InverterStatus::from(controller.state())), actuation)
            }
        };

        StatusSnapshot {
            timestamp: self.now,
            window: WindowStatus::new(window, self.now),
            forecast: forecast_status,
            battery: battery.as_ref().map(BatteryStatus::from),
            decision: decision.as_ref().map(DecisionStatus::from),
            inverter,
            actuation,
            errors,
        }
    }

    #[instrument(skip_all, fields(date = %date))]
    async fn forecast_solar(&self, date: NaiveDate) -> Result<Fetched<SolarForecast>> {
        let location = self.location.location().await.context("failed to resolve the location")?;
        let key = CacheKey::new(
            date,
            &format!(
                "solar|{:.3}|{:.3}|{:?}",
                location.latitude, location.longitude, self.solar_provider,
            ),
        );
        let fetched = self
            .solar_cache
            .get_or_fetch(&key, self.now, move || async move {
                let day = self
                    .weather
                    .fetch_weather(date, location)
                    .await
                    .map_err(ForecastError::FetchFailure)?;
                Ok(self.solar_provider.forecast(&day))
            })
            .await?;
        info!(energy = ?fetched.value.energy, freshness = ?fetched.freshness, "solar forecast");
        Ok(fetched)
    }

    /// Demand forecast, falling back to the configured default.
    #[instrument(skip_all, fields(date = %date))]
    async fn forecast_demand(&self, date: NaiveDate) -> (DemandEstimate, DemandOrigin) {
        let key = CacheKey::new(
            date,
            &format!(
                "demand|{}|{}|{:?}",
                self.demand.entity_id,
                self.demand.history.num_hours(),
                self.demand_provider,
            ),
        );
        let result = self
            .demand_cache
            .get_or_fetch(&key, self.now, move || async move {
                let history = self
                    .history
                    .fetch_history(&self.demand.entity_id, self.now - self.demand.history, self.now)
                    .await
                    .map_err(|error| {
                        ForecastError::InsufficientHistory(format!("{error:#}"))
                    })?;
                let samples = history
                    .into_iter()
                    .map(|(timestamp, value)| PowerSample { timestamp, power: Watts(value) })
                    .collect_vec();
                self.demand_provider.predict(&samples, date)
            })
            .await;
        match result {
            Ok(fetched) => {
                info!(energy = ?fetched.value.energy, freshness = ?fetched.freshness, "demand forecast");
                (fetched.value, DemandOrigin::Forecast(fetched.freshness))
            }
            Err(error) => {
                warn!(fallback = ?self.demand.fallback, "{error:#}, using the fallback demand");
                (
                    DemandEstimate { energy: self.demand.fallback, confidence: 0.0 },
                    DemandOrigin::Fallback,
                )
            }
        }
    }
}

fn note_error<T, E: Display>(result: Result<T, E>, errors: &mut Vec<String>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            error!("{error:#}");
            errors.push(format!("{error:#}"));
            None
        }
    }
}
