use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use tokio_modbus::SlaveId;
use url::Host;

use crate::prelude::*;

/// Modbus slave connection endpoint, parsed from `modbus+tcp://host[:port]/slave-id`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Endpoint {
    pub host: Host,
    pub port: u16,
    pub slave_id: SlaveId,
}

impl Endpoint {
    const DEFAULT_PORT: u16 = 502;
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(url: &str) -> Result<Self, Self::Err> {
        let url = url::Url::from_str(url).with_context(|| format!("`{url}` is an invalid URL"))?;
        ensure!(url.scheme() == "modbus+tcp", "only `modbus+tcp` scheme is currently supported");
        let host = url.host().context("the URL must contain host")?.to_owned();
        let port = url.port().unwrap_or(Self::DEFAULT_PORT);
        let slave_id = url
            .path_segments()
            .into_iter()
            .flatten()
            .next()
            .filter(|segment| !segment.is_empty())
            .context("slave ID must be specified in the first segment")?
            .parse()
            .context("incorrect slave ID")?;
        Ok(Self { host, port, slave_id })
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "modbus+tcp://{}:{}/{}", self.host, self.port, self.slave_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ok() -> Result {
        let endpoint: Endpoint = "modbus+tcp://192.168.1.20:1502/1".parse()?;
        assert_eq!(endpoint.host, Host::<String>::Ipv4([192, 168, 1, 20].into()));
        assert_eq!(endpoint.port, 1502);
        assert_eq!(endpoint.slave_id, 1);
        Ok(())
    }

    #[test]
    fn parse_default_port_ok() -> Result {
        let endpoint: Endpoint = "modbus+tcp://fronius.local/1".parse()?;
        assert_eq!(endpoint.host, Host::Domain("fronius.local".to_string()));
        assert_eq!(endpoint.port, 502);
        Ok(())
    }

    #[test]
    fn missing_slave_id_fails() {
        assert!("modbus+tcp://fronius.local/".parse::<Endpoint>().is_err());
        assert!("modbus+tcp://fronius.local".parse::<Endpoint>().is_err());
    }

    #[test]
    fn wrong_scheme_fails() {
        assert!("http://fronius.local/1".parse::<Endpoint>().is_err());
    }

    #[test]
    fn display_ok() -> Result {
        let endpoint: Endpoint = "modbus+tcp://192.168.1.20/1".parse()?;
        assert_eq!(endpoint.to_string(), "modbus+tcp://192.168.1.20:502/1");
        Ok(())
    }
}
