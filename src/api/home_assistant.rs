mod history;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use reqwest::{
    Client,
    ClientBuilder,
    Url,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use serde::{Deserialize, de::DeserializeOwned};

pub use self::history::{EntitiesHistory, State};
use crate::{
    api::retry::RetryPolicy,
    core::{
        battery::BatterySnapshot,
        source::{BatterySource, HistorySource, Location, LocationSource},
    },
    prelude::*,
    quantity::{power::Watts, proportions::Percent},
};

pub struct Api {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl Api {
    pub fn try_new(access_token: &str, base_url: Url, retry: RetryPolicy) -> Result<Self> {
        let headers = HeaderMap::from_iter([(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&format!("Bearer {access_token}"))?,
        )]);
        let client = ClientBuilder::new().default_headers(headers).build()?;
        Ok(Self { client, base_url, retry })
    }

    #[instrument(skip_all, fields(entity_id = entity_id))]
    pub async fn get_history<V>(
        &self,
        entity_id: &str,
        since: DateTime<Local>,
        until: DateTime<Local>,
    ) -> Result<EntitiesHistory<V>>
    where
        V: std::str::FromStr + DeserializeOwned,
        <V as std::str::FromStr>::Err: std::fmt::Display,
    {
        let mut url = self.url(&["history", "period", &since.to_rfc3339()])?;
        url.query_pairs_mut()
            .append_pair("filter_entity_id", entity_id)
            .append_pair("end_time", &until.to_rfc3339())
            .append_pair("no_attributes", "true");
        info!("fetching the history…");
        let history: EntitiesHistory<V> = self.get_json(url).await?;
        info!(n_entities = history.0.len(), "fetched");
        Ok(history)
    }

    #[instrument(skip_all, fields(entity_id = entity_id))]
    pub async fn get_state<V>(&self, entity_id: &str) -> Result<State<V>>
    where
        V: std::str::FromStr + DeserializeOwned,
        <V as std::str::FromStr>::Err: std::fmt::Display,
    {
        self.get_json(self.url(&["states", entity_id])?)
            .await
            .with_context(|| format!("failed to read a numeric state of `{entity_id}`"))
    }

    #[instrument(skip_all)]
    pub async fn get_config(&self) -> Result<Config> {
        let config: Config = self.get_json(self.url(&["config"])?).await?;
        info!(latitude = config.latitude, longitude = config.longitude, "fetched the configuration");
        Ok(config)
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("invalid base URL"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let url = &url;
        self.retry
            .run(|| async move {
                let response = self.client.get(url.clone()).send().await?.error_for_status()?;
                Ok::<_, Error>(response.json::<T>().await?)
            })
            .await
            .with_context(|| format!("request to `{url}` failed"))
    }
}

#[async_trait]
impl HistorySource for Api {
    async fn fetch_history(
        &self,
        entity_id: &str,
        since: DateTime<Local>,
        until: DateTime<Local>,
    ) -> Result<Vec<(DateTime<Local>, f64)>> {
        let history: EntitiesHistory<f64> = self.get_history(entity_id, since, until).await?;
        Ok(history.into_iter().flatten().map(|state| (state.last_changed_at, state.value)).collect())
    }
}

#[async_trait]
impl LocationSource for Api {
    async fn location(&self) -> Result<Location> {
        let config = self.get_config().await?;
        Ok(Location { latitude: config.latitude, longitude: config.longitude })
    }
}

#[must_use]
#[derive(Copy, Clone, Deserialize)]
pub struct Config {
    pub latitude: f64,
    pub longitude: f64,
}

/// Battery sensors exposed by the inverter integration.
pub struct Battery<'a> {
    pub api: &'a Api,
    pub state_of_charge_entity_id: String,

    /// Battery power, positive while charging.
    pub charge_rate_entity_id: String,
}

#[async_trait]
impl BatterySource for Battery<'_> {
    #[instrument(skip_all)]
    async fn read_battery(&self) -> Result<BatterySnapshot> {
        let (state_of_charge, charge_rate) = tokio::try_join!(
            self.api.get_state::<f64>(&self.state_of_charge_entity_id),
            self.api.get_state::<f64>(&self.charge_rate_entity_id),
        )?;
        ensure!(
            (0.0..=100.0).contains(&state_of_charge.value),
            "state of charge {} is out of range",
            state_of_charge.value,
        );
        let snapshot = BatterySnapshot {
            state_of_charge: Percent(state_of_charge.value),
            charge_rate: Watts(charge_rate.value),
            timestamp: state_of_charge.last_changed_at.max(charge_rate.last_changed_at),
        };
        info!(state_of_charge = ?snapshot.state_of_charge, charge_rate = ?snapshot.charge_rate, "read the battery");
        Ok(snapshot)
    }
}
