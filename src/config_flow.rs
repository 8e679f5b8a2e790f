//! Creation of config entries from user input.
use std::{
    net::{IpAddr, Ipv6Addr, SocketAddr},
    time::Duration,
};

use crate::{
    config::{ConfigEntry, EntryStore},
    error::ConfigFlowError,
    EcocompteurClient, DEFAULT_TIMEOUT,
};

/// Port used to resolve hostnames without an explicit port.
const HTTP_PORT: u16 = 80;

/// Form submitted by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInput {
    pub host: String,
    pub name: Option<String>,
}

/// Validates user input and creates config entries.
#[derive(Debug, Clone, Copy)]
pub struct ConfigFlow {
    timeout: Duration,
}

impl Default for ConfigFlow {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ConfigFlow {
    /// Sets the timeout of the connectivity probe.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Handles the user step: validate the host, refuse duplicates, probe the device.
    ///
    /// The returned entry is not added to the store; the caller does that once it is accepted.
    ///
    /// # Errors
    ///
    /// Will return `InvalidHost` for a host that is neither an IP address nor a resolvable hostname,
    /// `AlreadyConfigured` if the store already has an entry for it, and `CannotConnect` if the device
    /// does not answer `data.json` properly.
    pub async fn step_user(
        &self,
        input: UserInput,
        store: &EntryStore,
    ) -> Result<ConfigEntry, ConfigFlowError> {
        let host = normalize_host(&input.host)?;
        resolve(&host).await?;

        if store.find_by_host(&host).is_some() {
            return Err(ConfigFlowError::AlreadyConfigured { host });
        }

        let probe = async {
            let client = EcocompteurClient::builder()
                .host(&host)
                .timeout(self.timeout)
                .build()?;
            client.fetch_data().await
        };
        if let Err(e) = probe.await {
            tracing::error!("Cannot connect to {host}: {e}");
            return Err(ConfigFlowError::CannotConnect { host, source: e });
        }

        let name = input
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());
        let entry = ConfigEntry::new(&host, name);
        tracing::info!("Created config entry {} for {host}", entry.entry_id);
        Ok(entry)
    }
}

/// Checks the syntax of a host and returns it in the form used in urls.
///
/// Accepts IP addresses and hostnames, with an optional port. Bare IPv6 addresses get brackets.
///
/// # Errors
///
/// Will return `InvalidHost` when the host cannot be used in a url.
pub fn normalize_host(raw: &str) -> Result<String, ConfigFlowError> {
    let host = raw.trim();
    let invalid = || ConfigFlowError::InvalidHost {
        host: raw.to_owned(),
    };

    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(match ip {
            IpAddr::V4(ip) => ip.to_string(),
            IpAddr::V6(ip) => format!("[{ip}]"),
        });
    }
    if let Some(inner) = host.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
        let ip = inner.parse::<Ipv6Addr>().map_err(|_e| invalid())?;
        return Ok(format!("[{ip}]"));
    }
    if let Ok(addr) = host.parse::<SocketAddr>() {
        return Ok(addr.to_string());
    }

    let (name, port) = match host.rsplit_once(':') {
        Some((name, port)) => (name, Some(port)),
        None => (host, None),
    };
    if let Some(port) = port {
        port.parse::<u16>().map_err(|_e| invalid())?;
    }
    if !is_hostname(name) {
        return Err(invalid());
    }
    Ok(host.to_ascii_lowercase())
}

fn is_hostname(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 253
        && name.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Form of a host used to tell devices apart: normalized, with the default port made explicit.
///
/// Hosts that do not normalize are compared trimmed and lowercased.
pub(crate) fn canonical_host(host: &str) -> String {
    normalize_host(host).map_or_else(
        |_e| host.trim().to_ascii_lowercase(),
        |host| with_default_port(&host),
    )
}

fn with_default_port(host: &str) -> String {
    let has_port = if host.starts_with('[') {
        host.contains("]:")
    } else {
        host.contains(':')
    };
    if has_port {
        host.to_owned()
    } else {
        format!("{host}:{HTTP_PORT}")
    }
}

/// Makes sure a normalized host resolves to at least one address.
async fn resolve(host: &str) -> Result<(), ConfigFlowError> {
    let invalid = || ConfigFlowError::InvalidHost {
        host: host.to_owned(),
    };
    let target = with_default_port(host);
    let mut addresses = tokio::net::lookup_host(target.as_str()).await.map_err(|e| {
        tracing::debug!("Cannot resolve {host}: {e}");
        invalid()
    })?;
    addresses.next().map(|_| ()).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_ip_addresses() {
        assert_eq!(normalize_host(" 192.168.1.20 ").unwrap(), "192.168.1.20");
        assert_eq!(normalize_host("192.168.1.20:8080").unwrap(), "192.168.1.20:8080");
        assert_eq!(normalize_host("fe80::1").unwrap(), "[fe80::1]");
        assert_eq!(normalize_host("[::1]:8080").unwrap(), "[::1]:8080");
    }

    #[test]
    fn test_bracketed_ipv6_without_port() {
        assert_eq!(normalize_host("[::1]").unwrap(), "[::1]");
        assert_eq!(normalize_host(" [FE80::1] ").unwrap(), "[fe80::1]");
        let normalized = normalize_host("::1").unwrap();
        assert_eq!(normalize_host(&normalized).unwrap(), normalized);
        assert_eq!(normalize_host("[not-an-ip]").unwrap_err().key(), "invalid_host");
    }

    #[test]
    fn test_canonical_host_makes_default_port_explicit() {
        assert_eq!(canonical_host("10.0.0.5"), "10.0.0.5:80");
        assert_eq!(canonical_host("10.0.0.5:80"), "10.0.0.5:80");
        assert_eq!(canonical_host("10.0.0.5:8080"), "10.0.0.5:8080");
        assert_eq!(canonical_host("::1"), "[::1]:80");
        assert_eq!(canonical_host("[::1]:80"), "[::1]:80");
        assert_eq!(canonical_host("Ecocompteur.LAN"), "ecocompteur.lan:80");
    }

    #[test]
    fn test_normalize_hostnames() {
        assert_eq!(normalize_host("Ecocompteur.lan").unwrap(), "ecocompteur.lan");
        assert_eq!(normalize_host("localhost:8080").unwrap(), "localhost:8080");
    }

    #[test]
    fn test_invalid_hosts() {
        for host in ["", "http://10.0.0.1", "bad host", "-lead.lan", "host:port", "a..b"] {
            let err = normalize_host(host).unwrap_err();
            assert_eq!(err.key(), "invalid_host", "{host}");
        }
    }

    #[tokio::test]
    async fn test_resolve_ip_literal() {
        resolve("127.0.0.1").await.unwrap();
        resolve("127.0.0.1:8080").await.unwrap();
        resolve("[::1]").await.unwrap();
    }
}
