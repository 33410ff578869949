use std::path::PathBuf;

use chrono::TimeDelta;
use clap::Parser;

use crate::{
    core::cache::{Entries, ForecastCache},
    db::{Db, lock::RunLock, state::State},
    prelude::*,
};

#[derive(Parser)]
pub struct StorageArgs {
    /// Directory for the inverter state, forecast cache, and run lock.
    #[clap(long = "data-dir", env = "DATA_DIR", default_value = "/data")]
    data_dir: PathBuf,

    /// Locks older than this are considered left over by a crashed invocation.
    #[clap(long = "lock-expiration", env = "LOCK_EXPIRATION", default_value = "10m")]
    lock_expiration: humantime::Duration,

    /// Always fetch the forecasts.
    #[clap(long = "disable-forecast-cache", env = "DISABLE_FORECAST_CACHE")]
    disable_forecast_cache: bool,
}

impl StorageArgs {
    pub fn open(&self) -> Result<(Db, RunLock)> {
        let db = Db::open(&self.data_dir)?;
        let lock = RunLock::acquire(&db, self.lock_expiration.into())?;
        Ok((db, lock))
    }

    pub fn cache<V: Clone>(&self, db: &Db, ttl: TimeDelta) -> ForecastCache<V>
    where
        Entries<V>: State,
    {
        if self.disable_forecast_cache {
            info!("forecast cache is disabled");
            ForecastCache::disabled()
        } else {
            ForecastCache::load(db.clone(), ttl)
        }
    }
}
