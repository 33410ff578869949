use clap::Parser;
use reqwest::Url;

use crate::{
    api::{open_meteo, retry::RetryPolicy},
    core::solar::SolarForecastProvider,
    prelude::*,
    quantity::power::Kilowatts,
};

#[derive(Parser)]
pub struct WeatherArgs {
    #[clap(
        long = "open-meteo-url",
        env = "OPEN_METEO_URL",
        default_value = "https://api.open-meteo.com/v1/forecast"
    )]
    url: Url,

    /// Do not derate overcast days.
    #[clap(long = "disable-cloud-derating", env = "DISABLE_CLOUD_DERATING")]
    disable_cloud_derating: bool,
}

impl WeatherArgs {
    pub fn connect(&self, retry: RetryPolicy) -> Result<open_meteo::Api> {
        open_meteo::Api::try_new(self.url.clone(), retry)
    }

    pub const fn solar_provider(&self, system_size: Kilowatts) -> SolarForecastProvider {
        SolarForecastProvider { system_size, cloud_derating: !self.disable_cloud_derating }
    }
}
