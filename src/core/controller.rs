use chrono::{DateTime, Local};
use serde::Serialize;

use crate::{
    core::{
        error::ControllerError,
        inverter::{InverterMode, InverterState, RegisterBus, RegisterMap, Target},
    },
    db::Db,
    prelude::*,
    quantity::power::Watts,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    /// The inverter is already in the target state.
    None,

    StartCharging { rate: Watts },

    AdjustRate { from: Watts, to: Watts },

    StopCharging,
}

#[must_use]
#[derive(Copy, Clone, Debug)]
pub struct RateLimits {
    pub max_charge_rate: Watts,

    /// Smaller rate changes are not written.
    pub tolerance: Watts,
}

/// Drives the inverter towards the target state, writing only what differs from the last
/// confirmed state.
///
/// The state is persisted only after all the writes of a transition have succeeded,
/// so a failed transition gets retried by the next invocation.
pub struct InverterController<'a> {
    db: &'a Db,
    bus: &'a dyn RegisterBus,
    registers: RegisterMap,
    limits: RateLimits,
    state: InverterState,
}

impl<'a> InverterController<'a> {
    #[instrument(skip_all)]
    pub fn load(
        db: &'a Db,
        bus: &'a dyn RegisterBus,
        registers: RegisterMap,
        limits: RateLimits,
    ) -> Result<Self> {
        let state = db.states().get::<InverterState>()?.unwrap_or_default();
        info!(mode = ?state.mode, commanded_rate = ?state.commanded_rate, "loaded the inverter state");
        Ok(Self { db, bus, registers, limits, state })
    }

    pub const fn state(&self) -> &InverterState {
        &self.state
    }

    #[instrument(skip_all, fields(target = ?target))]
    pub async fn apply(
        &mut self,
        target: Target,
        now: DateTime<Local>,
    ) -> Result<Transition, ControllerError> {
        let transition = match (self.state.mode, self.clamp(target)) {
            (InverterMode::Normal, Target::Normal) => Transition::None,
            (InverterMode::Normal, Target::ForceCharge(rate)) => Transition::StartCharging { rate },
            (InverterMode::ForceCharge, Target::ForceCharge(rate)) => {
                let from = self.state.commanded_rate;
                if (rate - from).abs() > self.limits.tolerance {
                    Transition::AdjustRate { from, to: rate }
                } else {
                    Transition::None
                }
            }
            (InverterMode::ForceCharge, Target::Normal) => Transition::StopCharging,
        };
        self.execute(transition, now).await
    }

    /// Return to the normal mode regardless of the persisted state.
    #[instrument(skip_all)]
    pub async fn reset(&mut self, now: DateTime<Local>) -> Result<Transition, ControllerError> {
        self.execute(Transition::StopCharging, now).await
    }

    fn clamp(&self, target: Target) -> Target {
        match target {
            Target::Normal => Target::Normal,
            Target::ForceCharge(rate) => {
                Target::ForceCharge(rate.clamp(Watts::ZERO, self.limits.max_charge_rate))
            }
        }
    }

    async fn execute(
        &mut self,
        transition: Transition,
        now: DateTime<Local>,
    ) -> Result<Transition, ControllerError> {
        let next_state = match transition {
            Transition::None => {
                info!(mode = ?self.state.mode, "already in the target state");
                return Ok(transition);
            }
            Transition::StartCharging { rate } => {
                self.write_mode(InverterMode::ForceCharge).await?;
                if let Err(error) = self.write_rate(rate).await {
                    self.revert_mode(now).await;
                    return Err(error);
                }
                InverterState::force_charge(rate, now)
            }
            Transition::AdjustRate { to, .. } => {
                self.write_rate(to).await?;
                InverterState::force_charge(to, now)
            }
            Transition::StopCharging => {
                self.write_mode(InverterMode::Normal).await?;
                InverterState::normal(now)
            }
        };
        self.db.states().set(&next_state).map_err(ControllerError::Persistence)?;
        self.state = next_state;
        info!(?transition, "applied");
        Ok(transition)
    }

    /// Best-effort return to the normal mode after the mode was switched but the rate write failed.
    ///
    /// Should the revert fail as well, force-charging with an unknown rate is persisted,
    /// so that the next invocation stops charging or rewrites the rate.
    async fn revert_mode(&mut self, now: DateTime<Local>) {
        warn!("the charge rate write failed, reverting the mode…");
        let next_state = match self.write_mode(InverterMode::Normal).await {
            Ok(()) => return,
            Err(error) => {
                error!("failed to revert the mode: {error:#}");
                InverterState::force_charge(Watts::ZERO, now)
            }
        };
        match self.db.states().set(&next_state) {
            Ok(()) => self.state = next_state,
            Err(error) => error!("failed to persist the inverter state: {error:#}"),
        }
    }

    async fn write_mode(&self, mode: InverterMode) -> Result<(), ControllerError> {
        let value = self.registers.mode_value(mode);
        info!(?mode, address = self.registers.mode, value, "writing the mode…");
        Ok(self.bus.write_register(self.registers.mode, value).await?)
    }

    async fn write_rate(&self, rate: Watts) -> Result<(), ControllerError> {
        let value = self.registers.encode_rate(rate);
        info!(rate = ?rate, address = self.registers.rate, value, "writing the charge rate…");
        Ok(self.bus.write_register(self.registers.rate, value).await?)
    }
}
