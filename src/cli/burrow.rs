use chrono::Local;
use clap::{Parser, Subcommand};

use crate::{
    cli::{inverter::InverterArgs, retry::RetryArgs, storage::StorageArgs},
    core::{
        controller::InverterController,
        inverter::{RegisterBus, Target},
    },
    prelude::*,
    quantity::power::Watts,
    tables::build_registers_table,
};

#[derive(Parser)]
pub struct BurrowArgs {
    #[command(subcommand)]
    command: BurrowCommand,
}

impl BurrowArgs {
    pub async fn run(self) -> Result {
        match self.command {
            BurrowCommand::Registers(args) => args.run().await,
            BurrowCommand::Charge(args) => args.run().await,
        }
    }
}

#[derive(Subcommand)]
enum BurrowCommand {
    /// Read the mode and charge rate registers.
    Registers(BurrowRegistersArgs),

    /// Force-charge the battery until the next `hunt` or `stop`.
    Charge(BurrowChargeArgs),
}

#[derive(Parser)]
struct BurrowRegistersArgs {
    #[clap(flatten)]
    inverter: InverterArgs,

    #[clap(flatten)]
    retry: RetryArgs,
}

impl BurrowRegistersArgs {
    #[instrument(skip_all)]
    async fn run(self) -> Result {
        let registers = self.inverter.registers();
        let bus = self.inverter.client(self.retry.modbus());
        let mode = bus.read_register(registers.mode).await?;
        let rate = bus.read_register(registers.rate).await?;
        info!(mode, rate, "gotcha");
        println!("{}", build_registers_table(&registers, mode, rate));
        Ok(())
    }
}

#[derive(Parser)]
struct BurrowChargeArgs {
    /// Charge rate, half of the maximum by default.
    #[clap(long = "rate-watts")]
    rate: Option<Watts>,

    #[clap(flatten)]
    inverter: InverterArgs,

    #[clap(flatten)]
    retry: RetryArgs,

    #[clap(flatten)]
    storage: StorageArgs,
}

impl BurrowChargeArgs {
    #[instrument(skip_all)]
    async fn run(self) -> Result {
        let rate = self.rate.unwrap_or(self.inverter.max_charge_rate / 2.0);
        let (db, _lock) = self.storage.open()?;
        let bus = self.inverter.client(self.retry.modbus());
        let mut controller =
            InverterController::load(&db, &bus, self.inverter.registers(), self.inverter.limits())?;
        let transition = controller.apply(Target::ForceCharge(rate), Local::now()).await?;
        info!(?transition, "charging");
        Ok(())
    }
}
