use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;

use crate::{
    core::{
        battery::BatterySnapshot,
        cache::Freshness,
        controller::Transition,
        deficit::DeficitDecision,
        demand::DemandEstimate,
        forecast::ForecastResult,
        inverter::{InverterMode, InverterState},
    },
    ops::Interval,
    quantity::{energy::KilowattHours, power::Watts, proportions::Percent},
};

/// Everything the cycle knows, published once per invocation.
#[must_use]
#[derive(Clone, Debug, Serialize)]
pub struct StatusSnapshot {
    pub timestamp: DateTime<Local>,
    pub window: WindowStatus,
    pub forecast: Option<ForecastStatus>,
    pub battery: Option<BatteryStatus>,
    pub decision: Option<DecisionStatus>,
    pub inverter: Option<InverterStatus>,
    pub actuation: Actuation,
    pub errors: Vec<String>,
}

#[derive(Copy, Clone, Debug, Serialize)]
pub struct WindowStatus {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub is_active: bool,
}

impl WindowStatus {
    pub fn new(window: Interval, now: DateTime<Local>) -> Self {
        Self { start: window.start, end: window.end, is_active: window.contains(now) }
    }
}

#[derive(Copy, Clone, Debug, Serialize)]
pub struct ForecastStatus {
    pub date: NaiveDate,
    pub solar_kwh: KilowattHours,
    pub solar_freshness: Freshness,
    pub demand_kwh: KilowattHours,
    pub demand_origin: DemandOrigin,
    pub demand_confidence: f64,
}

impl ForecastStatus {
    pub const fn new(
        forecast: &ForecastResult,
        solar_freshness: Freshness,
        demand: &DemandEstimate,
        demand_origin: DemandOrigin,
    ) -> Self {
        Self {
            date: forecast.date,
            solar_kwh: forecast.solar,
            solar_freshness,
            demand_kwh: forecast.demand,
            demand_origin,
            demand_confidence: demand.confidence,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "freshness", rename_all = "snake_case")]
pub enum DemandOrigin {
    Forecast(Freshness),

    /// The configured default, the history was insufficient.
    Fallback,
}

#[derive(Copy, Clone, Debug, Serialize)]
pub struct BatteryStatus {
    pub soc_percent: Percent,
    pub is_charging: bool,
    pub rate_w: Watts,
}

impl From<&BatterySnapshot> for BatteryStatus {
    fn from(battery: &BatterySnapshot) -> Self {
        Self {
            soc_percent: battery.state_of_charge,
            is_charging: battery.is_charging(),
            rate_w: battery.charge_rate,
        }
    }
}

#[derive(Copy, Clone, Debug, Serialize)]
pub struct DecisionStatus {
    pub deficit_kwh: KilowattHours,
    pub sunset_shortfall_kwh: KilowattHours,
    pub should_charge: bool,
    pub required_rate_w: Watts,
}

impl From<&DeficitDecision> for DecisionStatus {
    fn from(decision: &DeficitDecision) -> Self {
        Self {
            deficit_kwh: decision.deficit,
            sunset_shortfall_kwh: decision.sunset_shortfall,
            should_charge: decision.should_charge_overnight,
            required_rate_w: decision.required_charge_rate,
        }
    }
}

#[derive(Copy, Clone, Debug, Serialize)]
pub struct InverterStatus {
    pub mode: InverterMode,
    pub commanded_rate_w: Watts,
    pub last_written_at: Option<DateTime<Local>>,
}

impl From<&InverterState> for InverterStatus {
    fn from(state: &InverterState) -> Self {
        Self {
            mode: state.mode,
            commanded_rate_w: state.commanded_rate,
            last_written_at: state.last_written_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Actuation {
    /// Dry run.
    Skipped,

    /// No decision could be made, the inverter is left as is.
    Held,

    Applied { transition: Transition },

    Failed { error: String },
}
