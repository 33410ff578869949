use std::{fs, io::ErrorKind, path::Path};

use serde::{Serialize, de::DeserializeOwned};

use crate::{db::write_atomically, prelude::*};

/// Persisted state identifier, each state lives in its own file.
#[derive(Copy, Clone, Debug)]
pub enum StateId {
    InverterState,
    SolarForecasts,
    DemandForecasts,
}

impl StateId {
    const fn file_name(self) -> &'static str {
        match self {
            Self::InverterState => "inverter-state.toml",
            Self::SolarForecasts => "solar-forecasts.toml",
            Self::DemandForecasts => "demand-forecasts.toml",
        }
    }
}

pub trait State: Serialize + DeserializeOwned {
    const ID: StateId;
}

/// States preserved between the application runs.
#[must_use]
pub struct States<'a>(pub(super) &'a Path);

impl States<'_> {
    #[instrument(skip_all, fields(id = ?S::ID))]
    pub fn get<S: State>(&self) -> Result<Option<S>> {
        debug!("reading the state…");
        let path = self.0.join(S::ID.file_name());
        match fs::read_to_string(&path) {
            Ok(contents) => toml::from_str(&contents)
                .map(Some)
                .with_context(|| format!("failed to deserialize `{}`", path.display())),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error).with_context(|| format!("failed to read `{}`", path.display())),
        }
    }

    #[instrument(skip_all, fields(id = ?S::ID))]
    pub fn set<S: State>(&self, state: &S) -> Result {
        debug!("saving the state…");
        let contents = toml::to_string(state)
            .with_context(|| format!("failed to serialize `{:?}`", S::ID))?;
        write_atomically(&self.0.join(S::ID.file_name()), contents.as_bytes())
    }
}
