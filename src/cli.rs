mod burrow;
mod demand;
mod home_assistant;
mod hunt;
mod inverter;
mod retry;
mod status;
mod stop;
mod storage;
mod system;
mod weather;

use clap::{Parser, Subcommand};

use crate::cli::{burrow::BurrowArgs, hunt::HuntArgs, stop::StopArgs};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Main command: forecast, decide, and drive the inverter.
    #[clap(name = "hunt")]
    Hunt(Box<HuntArgs>),

    /// Return the inverter to the normal mode.
    #[clap(name = "stop")]
    Stop(Box<StopArgs>),

    /// Development tools.
    #[clap(name = "burrow")]
    Burrow(Box<BurrowArgs>),
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn verify_args() {
        Args::command().debug_assert();
    }
}
