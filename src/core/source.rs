//! Collaborators feeding the cycle.

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;

use crate::{
    core::{battery::BatterySnapshot, solar::WeatherDay},
    prelude::*,
};

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn location(&self) -> Result<Location>;
}

#[async_trait]
impl LocationSource for Location {
    async fn location(&self) -> Result<Location> {
        Ok(*self)
    }
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_weather(&self, date: NaiveDate, location: Location) -> Result<WeatherDay>;
}

#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Numeric states of the entity, non-numeric ones are skipped.
    async fn fetch_history(
        &self,
        entity_id: &str,
        since: DateTime<Local>,
        until: DateTime<Local>,
    ) -> Result<Vec<(DateTime<Local>, f64)>>;
}

#[async_trait]
pub trait BatterySource: Send + Sync {
    async fn read_battery(&self) -> Result<BatterySnapshot>;
}

#[cfg(test)]
pub mod fake {
    use super::*;

    pub struct StaticWeather(pub Option<WeatherDay>);

    #[async_trait]
    impl WeatherSource for StaticWeather {
        async fn fetch_weather(&self, _date: NaiveDate, _location: Location) -> Result<WeatherDay> {
            self.0.clone().context("weather service is down")
        }
    }

    pub struct StaticHistory(pub Vec<(DateTime<Local>, f64)>);

    #[async_trait]
    impl HistorySource for StaticHistory {
        async fn fetch_history(
            &self,
            _entity_id: &str,
            since: DateTime<Local>,
            until: DateTime<Local>,
        ) -> Result<Vec<(DateTime<Local>, f64)>> {
            Ok(self.0.iter().copied().filter(|(timestamp, _)| (since..until).contains(timestamp)).collect())
        }
    }

    pub struct StaticBattery(pub Option<BatterySnapshot>);

    #[async_trait]
    impl BatterySource for StaticBattery {
        async fn read_battery(&self) -> Result<BatterySnapshot> {
            self.0.context("battery sensors are unavailable")
        }
    }
}
