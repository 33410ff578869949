use clap::Parser;
use reqwest::Url;

use crate::{
    api::{home_assistant, retry::RetryPolicy},
    core::source::Location,
    prelude::*,
};

#[derive(Parser)]
pub struct HomeAssistantArgs {
    /// Home Assistant REST API base URL.
    #[clap(
        long = "home-assistant-url",
        env = "HOME_ASSISTANT_URL",
        default_value = "http://supervisor/core/api"
    )]
    base_url: Url,

    #[clap(long = "home-assistant-token", env = "SUPERVISOR_TOKEN", hide_env_values = true)]
    access_token: String,

    /// Explicit latitude, otherwise taken from the Home Assistant configuration.
    #[clap(long, env = "LATITUDE", requires = "longitude", allow_negative_numbers = true)]
    latitude: Option<f64>,

    #[clap(long, env = "LONGITUDE", requires = "latitude", allow_negative_numbers = true)]
    longitude: Option<f64>,

    #[clap(
        long = "state-of-charge-entity-id",
        env = "STATE_OF_CHARGE_ENTITY_ID",
        default_value = "sensor.byd_battery_box_premium_hv_state_of_charge"
    )]
    state_of_charge_entity_id: String,

    /// Battery power sensor, positive while charging.
    #[clap(
        long = "charge-rate-entity-id",
        env = "CHARGE_RATE_ENTITY_ID",
        default_value = "sensor.solarnet_power_battery_charge"
    )]
    charge_rate_entity_id: String,
}

impl HomeAssistantArgs {
    pub fn connect(&self, retry: RetryPolicy) -> Result<home_assistant::Api> {
        home_assistant::Api::try_new(&self.access_token, self.base_url.clone(), retry)
    }

    pub fn location(&self) -> Option<Location> {
        Some(Location { latitude: self.latitude?, longitude: self.longitude? })
    }

    pub fn battery<'a>(&self, api: &'a home_assistant::Api) -> home_assistant::Battery<'a> {
        home_assistant::Battery {
            api,
            state_of_charge_entity_id: self.state_of_charge_entity_id.clone(),
            charge_rate_entity_id: self.charge_rate_entity_id.clone(),
        }
    }
}
