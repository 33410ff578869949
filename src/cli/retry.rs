use clap::Parser;

use crate::api::retry::RetryPolicy;

#[derive(Parser)]
pub struct RetryArgs {
    /// Timeout of a single Home Assistant or weather request.
    #[clap(long = "http-timeout", env = "HTTP_TIMEOUT", default_value = "30s")]
    http_timeout: humantime::Duration,

    /// Timeout of a single register operation, including connecting.
    #[clap(long = "modbus-timeout", env = "MODBUS_TIMEOUT", default_value = "15s")]
    modbus_timeout: humantime::Duration,

    /// Total number of attempts per call.
    #[clap(long = "n-attempts", env = "N_ATTEMPTS", default_value = "3")]
    n_attempts: u32,

    /// Delay before the first retry, doubled on every subsequent one.
    #[clap(long = "initial-backoff", env = "INITIAL_BACKOFF", default_value = "1s")]
    initial_backoff: humantime::Duration,
}

impl RetryArgs {
    pub fn http(&self) -> RetryPolicy {
        self.policy(self.http_timeout)
    }

    pub fn modbus(&self) -> RetryPolicy {
        self.policy(self.modbus_timeout)
    }

    fn policy(&self, timeout: humantime::Duration) -> RetryPolicy {
        RetryPolicy::builder()
            .timeout(timeout.into())
            .n_attempts(self.n_attempts)
            .initial_backoff(self.initial_backoff.into())
            .build()
    }
}
