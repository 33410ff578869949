use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use itertools::izip;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::{
    api::retry::RetryPolicy,
    core::{
        solar::{HourlyWeather, WeatherDay},
        source::{Location, WeatherSource},
    },
    prelude::*,
};

pub struct Api {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl Api {
    const TIME_FORMAT: &'static str = "%Y-%m-%dT%H:%M";

    pub fn try_new(base_url: Url, retry: RetryPolicy) -> Result<Self> {
        Ok(Self { client: Client::builder().build()?, base_url, retry })
    }

    #[instrument(skip_all, fields(date = %date, latitude = location.latitude, longitude = location.longitude))]
    pub async fn get_forecast(&self, date: NaiveDate, location: Location) -> Result<Forecast> {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("latitude", &location.latitude.to_string())
            .append_pair("longitude", &location.longitude.to_string())
            .append_pair("hourly", "shortwave_radiation,cloud_cover")
            .append_pair("daily", "sunrise,sunset")
            .append_pair("timezone", "auto")
            .append_pair("start_date", &date.to_string())
            .append_pair("end_date", &date.to_string());
        info!("fetching the weather forecast…");
        let url = &url;
        let forecast: Forecast = self
            .retry
            .run(|| async move {
                let response = self.client.get(url.clone()).send().await?.error_for_status()?;
                Ok::<_, Error>(response.json::<Forecast>().await?)
            })
            .await
            .context("failed to fetch the weather forecast")?;
        info!(n_hours = forecast.hourly.time.len(), "fetched");
        Ok(forecast)
    }
}

#[async_trait]
impl WeatherSource for Api {
    async fn fetch_weather(&self, date: NaiveDate, location: Location) -> Result<WeatherDay> {
        self.get_forecast(date, location).await?.into_weather_day(date)
    }
}

#[must_use]
#[derive(Deserialize)]
pub struct Forecast {
    hourly: Hourly,
    daily: Daily,
}

#[derive(Deserialize)]
struct Hourly {
    time: Vec<String>,
    shortwave_radiation: Vec<Option<f64>>,
    cloud_cover: Vec<Option<f64>>,
}

#[derive(Deserialize)]
struct Daily {
    time: Vec<NaiveDate>,
    sunrise: Vec<Option<String>>,
    sunset: Vec<Option<String>>,
}

impl Forecast {
    pub fn into_weather_day(self, date: NaiveDate) -> Result<WeatherDay> {
        ensure!(
            self.hourly.time.len() == self.hourly.shortwave_radiation.len()
                && self.hourly.time.len() == self.hourly.cloud_cover.len(),
            "hourly series have different lengths",
        );
        let mut hourly = Vec::with_capacity(24);
        for (time, shortwave_radiation, cloud_cover) in
            izip!(self.hourly.time, self.hourly.shortwave_radiation, self.hourly.cloud_cover)
        {
            let time = parse_time(&time)?;
            if time.date() == date {
                hourly.push(HourlyWeather { hour: time.hour(), shortwave_radiation, cloud_cover });
            }
        }
        ensure!(!hourly.is_empty(), "no hourly forecast for {date}");

        let (sunrise, sunset) = match self.daily.time.iter().position(|day| *day == date) {
            Some(index) => (
                sun_time(self.daily.sunrise.get(index))?,
                sun_time(self.daily.sunset.get(index))?,
            ),
            None => {
                warn!(%date, "no sunrise and sunset in the forecast");
                (None, None)
            }
        };
        Ok(WeatherDay { date, hourly, sunrise, sunset })
    }
}

fn parse_time(time: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(time, Api::TIME_FORMAT)
        .with_context(|| format!("`{time}` is an invalid timestamp"))
}

fn sun_time(time: Option<&Option<String>>) -> Result<Option<NaiveTime>> {
    time.and_then(Option::as_deref).map(|time| Ok(parse_time(time)?.time())).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    // language=JSON
    const RESPONSE: &str = r#"
        {
            "latitude": 52.366,
            "longitude": 4.901,
            "timezone": "Europe/Amsterdam",
            "hourly_units": {"time": "iso8601", "shortwave_radiation": "W/m²", "cloud_cover": "%"},
            "hourly": {
                "time": ["2025-06-11T00:00", "2025-06-11T12:00", "2025-06-11T13:00", "2025-06-12T00:00"],
                "shortwave_radiation": [0.0, 650.0, null, 0.0],
                "cloud_cover": [100, 20, 35, 90]
            },
            "daily_units": {"time": "iso8601", "sunrise": "iso8601", "sunset": "iso8601"},
            "daily": {
                "time": ["2025-06-11"],
                "sunrise": ["2025-06-11T05:18"],
                "sunset": ["2025-06-11T22:02"]
            }
        }
    "#;

    #[test]
    fn weather_day_ok() -> Result {
        let date = NaiveDate::from_ymd_opt(2025, 6, 11).unwrap();
        let day = serde_json::from_str::<Forecast>(RESPONSE)?.into_weather_day(date)?;
        assert_eq!(day.hourly.len(), 3);
        assert_eq!(day.hourly[1].hour, 12);
        assert_eq!(day.hourly[1].shortwave_radiation, Some(650.0));
        assert_eq!(day.hourly[2].shortwave_radiation, None);
        assert_eq!(day.hourly[2].cloud_cover, Some(35.0));
        assert_eq!(day.sunrise, NaiveTime::from_hms_opt(5, 18, 0));
        assert_eq!(day.sunset, NaiveTime::from_hms_opt(22, 2, 0));
        Ok(())
    }

    #[test]
    fn missing_date_fails() -> Result {
        let date = NaiveDate::from_ymd_opt(2025, 6, 13).unwrap();
        assert!(serde_json::from_str::<Forecast>(RESPONSE)?.into_weather_day(date).is_err());
        Ok(())
    }

    #[tokio::test]
    #[ignore = "makes the API request"]
    async fn get_forecast_ok() -> Result {
        let retry = RetryPolicy::builder().timeout(std::time::Duration::from_secs(10)).build();
        let api = Api::try_new(Url::parse("https://api.open-meteo.com/v1/forecast")?, retry)?;
        let date = chrono::Local::now().date_naive();
        let day = api
            .fetch_weather(date, Location { latitude: 52.3676, longitude: 4.9041 })
            .await?;
        assert_eq!(day.hourly.len(), 24);
        Ok(())
    }
}
