use chrono::{Local, Timelike};
use clap::Parser;

use crate::{
    cli::{
        demand::DemandArgs,
        home_assistant::HomeAssistantArgs,
        inverter::InverterArgs,
        retry::RetryArgs,
        status::StatusArgs,
        storage::StorageArgs,
        system::SystemArgs,
        weather::WeatherArgs,
    },
    core::{
        controller::InverterController,
        cycle::Cycle,
        demand::DemandEstimate,
        solar::SolarForecast,
        source::LocationSource,
        status::Actuation,
    },
    prelude::*,
};

#[derive(Parser)]
pub struct HuntArgs {
    /// Compute and publish the decision without touching the inverter.
    #[clap(long)]
    scout: bool,

    #[clap(flatten)]
    system: SystemArgs,

    #[clap(flatten)]
    home_assistant: HomeAssistantArgs,

    #[clap(flatten)]
    demand: DemandArgs,

    #[clap(flatten)]
    weather: WeatherArgs,

    #[clap(flatten)]
    inverter: InverterArgs,

    #[clap(flatten)]
    retry: RetryArgs,

    #[clap(flatten)]
    storage: StorageArgs,

    #[clap(flatten)]
    status: StatusArgs,
}

impl HuntArgs {
    #[instrument(skip_all, fields(scout = self.scout))]
    pub async fn run(self) -> Result {
        let config = self.system.config(self.inverter.max_charge_rate)?;
        let (db, _lock) = self.storage.open()?;

        let home_assistant = self.home_assistant.connect(self.retry.http())?;
        let weather = self.weather.connect(self.retry.http())?;
        let explicit_location = self.home_assistant.location();
        let location: &dyn LocationSource = match &explicit_location {
            Some(location) => location,
            None => &home_assistant,
        };
        let battery = self.home_assistant.battery(&home_assistant);
        let demand = self.demand.settings()?;
        let demand_provider = self.demand.provider()?;
        let solar_cache = self.storage.cache::<SolarForecast>(&db, config.forecast_cache_ttl);
        let demand_cache = self.storage.cache::<DemandEstimate>(&db, config.forecast_cache_ttl);

        let bus = self.inverter.client(self.retry.modbus());
        let mut controller = if self.scout {
            None
        } else {
            Some(InverterController::load(&db, &bus, self.inverter.registers(), self.inverter.limits())?)
        };

        let now = Local::now().with_nanosecond(0).unwrap_or_else(Local::now);
        let snapshot = Cycle::builder()
            .config(&config)
            .now(now)
            .location(location)
            .weather(&weather)
            .history(&home_assistant)
            .battery(&battery)
            .solar_provider(self.weather.solar_provider(config.system_size))
            .demand_provider(&*demand_provider)
            .demand(&demand)
            .solar_cache(&solar_cache)
            .demand_cache(&demand_cache)
            .build()
            .run(controller.as_mut())
            .await;
        self.status.publisher().publish(&snapshot);

        if let Actuation::Failed { error } = &snapshot.actuation {
            bail!("failed to drive the inverter: {error}");
        }
        Ok(())
    }
}
