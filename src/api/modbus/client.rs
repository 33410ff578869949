use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use itertools::Itertools;
use tokio::{
    net::{TcpStream, lookup_host},
    sync::Mutex,
    time::timeout,
};
use tokio_modbus::{
    Slave,
    client::{Context, Reader, Writer, tcp::attach_slave},
};
use url::Host;

use crate::{
    api::{modbus::Endpoint, retry::RetryPolicy},
    core::{error::RegisterError, inverter::RegisterBus},
    prelude::*,
};

/// Lazily connected Modbus TCP client.
///
/// A communication failure drops the connection, the next attempt reconnects.
pub struct Client {
    endpoint: Endpoint,
    retry: RetryPolicy,
    context: Mutex<Option<Context>>,
}

impl Client {
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    pub const fn new(endpoint: Endpoint, retry: RetryPolicy) -> Self {
        Self { endpoint, retry, context: Mutex::const_new(None) }
    }

    #[instrument(skip_all, level = "debug", fields(address = address))]
    async fn try_read(&self, address: u16) -> Result<u16, RegisterError> {
        let mut slot = self.context.lock().await;
        let mut context = self.take_or_connect(&mut slot).await?;
        let response = context.read_holding_registers(address, 1).await;
        let words = settle(&mut slot, context, address, response)?;
        let value = words.first().copied().ok_or_else(|| {
            RegisterError::Communication(anyhow!("nothing is read from the register #{address}"))
        })?;
        debug!(value, "read");
        Ok(value)
    }

    #[instrument(skip_all, level = "debug", fields(address = address, value = value))]
    async fn try_write(&self, address: u16, value: u16) -> Result<(), RegisterError> {
        let mut slot = self.context.lock().await;
        let mut context = self.take_or_connect(&mut slot).await?;
        let response = context.write_single_register(address, value).await;
        settle(&mut slot, context, address, response)?;
        debug!("written");
        Ok(())
    }

    async fn take_or_connect(&self, slot: &mut Option<Context>) -> Result<Context, RegisterError> {
        match slot.take() {
            Some(context) => Ok(context),
            None => self.connect().await.map_err(RegisterError::Communication),
        }
    }

    #[instrument(
        skip_all,
        fields(host = %self.endpoint.host, port = self.endpoint.port, slave_id = self.endpoint.slave_id),
    )]
    async fn connect(&self) -> Result<Context> {
        info!("connecting…");
        let port = self.endpoint.port;
        let addresses = match &self.endpoint.host {
            Host::Domain(domain) => lookup_host((domain.as_str(), port)).await?.collect_vec(),
            Host::Ipv4(ip_address) => lookup_host((*ip_address, port)).await?.collect_vec(),
            Host::Ipv6(ip_address) => lookup_host((*ip_address, port)).await?.collect_vec(),
        };
        let tcp_stream = timeout(Self::CONNECT_TIMEOUT, TcpStream::connect(&*addresses))
            .await
            .context("timed out while connecting to the inverter")?
            .context("failed to connect to the inverter")?;
        tcp_stream.set_nodelay(true)?;
        info!("connected");
        Ok(attach_slave(tcp_stream, Slave(self.endpoint.slave_id)))
    }
}

/// Keep the connection unless the transport failed.
fn settle<T>(
    slot: &mut Option<Context>,
    context: Context,
    address: u16,
    response: tokio_modbus::Result<T>,
) -> Result<T, RegisterError> {
    match response {
        Ok(Ok(value)) => {
            *slot = Some(context);
            Ok(value)
        }
        Ok(Err(exception)) => {
            *slot = Some(context);
            Err(RegisterError::Rejected { address, reason: exception.to_string() })
        }
        Err(error) => {
            warn!("dropping the connection: {error:#}");
            Err(RegisterError::Communication(error.into()))
        }
    }
}

#[async_trait]
impl RegisterBus for Client {
    async fn read_register(&self, address: u16) -> Result<u16, RegisterError> {
        self.retry.run(move || self.try_read(address)).await
    }

    async fn write_register(&self, address: u16, value: u16) -> Result<(), RegisterError> {
        self.retry.run(move || self.try_write(address, value)).await
    }
}
