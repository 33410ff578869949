use chrono::Local;
use clap::Parser;

use crate::{
    cli::{inverter::InverterArgs, retry::RetryArgs, storage::StorageArgs},
    core::{controller::InverterController, inverter::Target},
    prelude::*,
};

#[derive(Parser)]
pub struct StopArgs {
    /// Write the normal mode even if the inverter is believed to be in it already.
    #[clap(long)]
    force: bool,

    #[clap(flatten)]
    inverter: InverterArgs,

    #[clap(flatten)]
    retry: RetryArgs,

    #[clap(flatten)]
    storage: StorageArgs,
}

impl StopArgs {
    #[instrument(skip_all, fields(force = self.force))]
    pub async fn run(self) -> Result {
        let (db, _lock) = self.storage.open()?;
        let bus = self.inverter.client(self.retry.modbus());
        let mut controller =
            InverterController::load(&db, &bus, self.inverter.registers(), self.inverter.limits())?;
        let now = Local::now();
        let transition = if self.force {
            controller.reset(now).await?
        } else {
            controller.apply(Target::Normal, now).await?
        };
        info!(?transition, "stopped");
        Ok(())
    }
}
