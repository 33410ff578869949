use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::{
    core::{deficit::DeficitDecision, error::RegisterError},
    db::state::{State, StateId},
    ops::Interval,
    quantity::power::Watts,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InverterMode {
    Normal,
    ForceCharge,
}

/// Last state confirmed by the inverter.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InverterState {
    pub mode: InverterMode,

    /// Meaningful only in the force-charge mode.
    pub commanded_rate: Watts,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_written_at: Option<DateTime<Local>>,
}

impl Default for InverterState {
    fn default() -> Self {
        Self { mode: InverterMode::Normal, commanded_rate: Watts::ZERO, last_written_at: None }
    }
}

impl State for InverterState {
    const ID: StateId = StateId::InverterState;
}

impl InverterState {
    pub const fn normal(written_at: DateTime<Local>) -> Self {
        Self { mode: InverterMode::Normal, commanded_rate: Watts::ZERO, last_written_at: Some(written_at) }
    }

    pub const fn force_charge(rate: Watts, written_at: DateTime<Local>) -> Self {
        Self { mode: InverterMode::ForceCharge, commanded_rate: rate, last_written_at: Some(written_at) }
    }
}

/// Desired inverter state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Normal,
    ForceCharge(Watts),
}

impl Target {
    /// Force-charge only inside the cheap window and only when there is something to charge.
    pub fn from_decision(decision: &DeficitDecision, window: Interval, now: DateTime<Local>) -> Self {
        if decision.should_charge_overnight
            && window.contains(now)
            && decision.required_charge_rate > Watts::ZERO
        {
            Self::ForceCharge(decision.required_charge_rate)
        } else {
            Self::Normal
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RateSign {
    /// Charging is a positive register value.
    Positive,

    /// Charging is a negative register value (two's complement).
    Negative,
}

/// Device-specific register layout.
#[must_use]
#[derive(Copy, Clone, Debug)]
pub struct RegisterMap {
    pub mode: u16,
    pub rate: u16,
    pub normal_mode: u16,
    pub force_charge_mode: u16,
    pub watts_per_unit: f64,
    pub rate_sign: RateSign,
}

impl RegisterMap {
    pub const fn mode_value(&self, mode: InverterMode) -> u16 {
        match mode {
            InverterMode::Normal => self.normal_mode,
            InverterMode::ForceCharge => self.force_charge_mode,
        }
    }

    pub const fn decode_mode(&self, value: u16) -> Option<InverterMode> {
        if value == self.normal_mode {
            Some(InverterMode::Normal)
        } else if value == self.force_charge_mode {
            Some(InverterMode::ForceCharge)
        } else {
            None
        }
    }

    #[must_use]
    pub fn encode_rate(&self, rate: Watts) -> u16 {
        let units = (rate.0 / self.watts_per_unit).round();
        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let value = match self.rate_sign {
            RateSign::Positive => units.clamp(0.0, f64::from(u16::MAX)) as u16,
            RateSign::Negative => (-units).clamp(f64::from(i16::MIN), 0.0) as i16 as u16,
        };
        value
    }

    pub fn decode_rate(&self, value: u16) -> Watts {
        #[expect(clippy::cast_possible_wrap)]
        let units = match self.rate_sign {
            RateSign::Positive => f64::from(value),
            RateSign::Negative => -f64::from(value as i16),
        };
        Watts(units * self.watts_per_unit)
    }
}

/// Inverter register access.
#[async_trait]
pub trait RegisterBus: Send + Sync {
    async fn read_register(&self, address: u16) -> Result<u16, RegisterError>;

    async fn write_register(&self, address: u16, value: u16) -> Result<(), RegisterError>;
}

#[cfg(test)]
pub mod fake {
    use std::{collections::HashMap, sync::Mutex};

    use super::*;
    use crate::prelude::*;

    /// In-memory inverter recording every write.
    #[derive(Default)]
    pub struct FakeBus {
        pub registers: Mutex<HashMap<u16, u16>>,
        pub writes: Mutex<Vec<(u16, u16)>>,
        pub failing_address: Mutex<Option<(u16, FakeFailure)>>,

        /// Every write fails once this many writes have succeeded.
        pub offline_after: Mutex<Option<usize>>,
    }

    #[derive(Copy, Clone)]
    pub enum FakeFailure {
        Offline,
        Rejected,
    }

    /// Fronius Gen24 storage control layout.
    pub fn fronius_registers() -> RegisterMap {
        RegisterMap {
            mode: 40348,
            rate: 40355,
            normal_mode: 0,
            force_charge_mode: 2,
            watts_per_unit: 10.0,
            rate_sign: RateSign::Negative,
        }
    }

    impl FakeBus {
        pub fn fail_on(&self, address: u16, failure: FakeFailure) {
            *self.failing_address.lock().unwrap() = Some((address, failure));
        }

        pub fn go_offline_after(&self, n_writes: usize) {
            *self.offline_after.lock().unwrap() = Some(n_writes);
        }

        pub fn recover(&self) {
            *self.failing_address.lock().unwrap() = None;
            *self.offline_after.lock().unwrap() = None;
        }

        pub fn mode_register(&self, registers: &RegisterMap) -> Option<u16> {
            self.registers.lock().unwrap().get(&registers.mode).copied()
        }

        pub fn writes(&self) -> Vec<(u16, u16)> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RegisterBus for FakeBus {
        async fn read_register(&self, address: u16) -> Result<u16, RegisterError> {
            Ok(self.registers.lock().unwrap().get(&address).copied().unwrap_or_default())
        }

        async fn write_register(&self, address: u16, value: u16) -> Result<(), RegisterError> {
            if self
                .offline_after
                .lock()
                .unwrap()
                .is_some_and(|n_writes| self.writes.lock().unwrap().len() >= n_writes)
            {
                return Err(RegisterError::Communication(anyhow!("no route to host")));
            }
            match *self.failing_address.lock().unwrap() {
                Some((failing, FakeFailure::Offline)) if failing == address => {
                    return Err(RegisterError::Communication(anyhow!("connection refused")));
                }
                Some((failing, FakeFailure::Rejected)) if failing == address => {
                    return Err(RegisterError::Rejected {
                        address,
                        reason: "IllegalDataValue".to_string(),
                    });
                }
                _ => {}
            }
            self.writes.lock().unwrap().push((address, value));
            self.registers.lock().unwrap().insert(address, value);
            Ok(())
        }
    }
}
