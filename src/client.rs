/// HTTP client for the Ecocompteur web API.
///
/// The device serves a handful of fixed files over plain HTTP, without authentication. Every call is a
/// single bounded GET; retrying is left to the caller, usually the [`crate::Coordinator`].
///
/// Use [`EcocompteurClient::builder`] to create a client.
mod endpoint;
mod transport;

use std::time::Duration;

pub use endpoint::Endpoint;

use crate::{
    error::ClientError,
    snapshot::{DeviceSnapshot, InstantSnapshot, PollResult},
    DEFAULT_TIMEOUT,
};

#[derive(Debug, Clone)]
pub struct EcocompteurClient {
    http: reqwest::Client,
    host: String,
}

impl EcocompteurClient {
    /// Creates a new builder for configuring a client.
    #[must_use]
    pub fn builder() -> EcocompteurClientBuilder {
        EcocompteurClientBuilder::new()
    }

    /// Host the client talks to, as configured.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Fetches `data.json` and normalizes it.
    ///
    /// # Errors
    ///
    /// Will return `DeviceUnreachable` if the device does not answer with HTTP 200, and
    /// `MalformedResponse` if the body is not valid JSON or lacks one of the expected fields.
    pub async fn fetch_data(&self) -> Result<DeviceSnapshot, ClientError> {
        let raw = transport::get_json(&self.http, &self.host, Endpoint::Data).await?;
        DeviceSnapshot::from_raw(&raw).map_err(|e| ClientError::MalformedResponse {
            url: Endpoint::Data.url(&self.host),
            reason: e.to_string(),
        })
    }

    /// Fetches the real-time readings of `inst.json`.
    ///
    /// # Errors
    ///
    /// Will return `DeviceUnreachable` if the device does not answer with HTTP 200, and
    /// `MalformedResponse` if the body is not a JSON object.
    pub async fn fetch_inst(&self) -> Result<InstantSnapshot, ClientError> {
        let raw = transport::get_json(&self.http, &self.host, Endpoint::Inst).await?;
        InstantSnapshot::from_raw(raw).map_err(|e| ClientError::MalformedResponse {
            url: Endpoint::Inst.url(&self.host),
            reason: e.to_string(),
        })
    }

    /// Fetches the hourly statistics log as raw CSV.
    ///
    /// # Errors
    ///
    /// Will return `DeviceUnreachable` if the device does not answer with HTTP 200.
    pub async fn fetch_log1(&self) -> Result<String, ClientError> {
        transport::get(&self.http, &self.host, Endpoint::Log1).await
    }

    /// Fetches the daily totals log as raw CSV.
    ///
    /// # Errors
    ///
    /// Will return `DeviceUnreachable` if the device does not answer with HTTP 200.
    pub async fn fetch_log2(&self) -> Result<String, ClientError> {
        transport::get(&self.http, &self.host, Endpoint::Log2).await
    }

    /// Fetches `data.json` then `inst.json`, the data set of one poll cycle.
    ///
    /// # Errors
    ///
    /// Will return the first error of either fetch.
    pub async fn fetch_poll_result(&self) -> Result<PollResult, ClientError> {
        Ok(PollResult {
            config: self.fetch_data().await?,
            values: self.fetch_inst().await?,
        })
    }
}

#[derive(Debug)]
pub struct EcocompteurClientBuilder {
    host: Option<String>,
    timeout: Duration,
}

impl EcocompteurClientBuilder {
    const fn new() -> Self {
        Self {
            host: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the device host, an IP address or hostname with an optional `:port`.
    #[must_use]
    pub fn host(mut self, host: &str) -> Self {
        self.host = Some(host.to_owned());
        self
    }

    /// Sets the per-request timeout, 5 seconds by default.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Will return an error if no host was set, or if the http client cannot be initialized.
    pub fn build(self) -> Result<EcocompteurClient, ClientError> {
        let host = self
            .host
            .filter(|host| !host.trim().is_empty())
            .ok_or_else(|| ClientError::Configuration {
                message: "Host is not set".into(),
            })?;

        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| ClientError::Configuration {
                message: format!("Cannot initialize http client: {e}"),
            })?;

        Ok(EcocompteurClient {
            http,
            host: host.trim().to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_host() {
        let err = EcocompteurClient::builder().build().unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: Host is not set");

        EcocompteurClient::builder().host("  ").build().unwrap_err();
    }

    #[test]
    fn test_builder_trims_host() {
        let client = EcocompteurClient::builder()
            .host(" 192.168.1.20 ")
            .timeout(Duration::from_secs(1))
            .build()
            .unwrap();
        assert_eq!(client.host(), "192.168.1.20");
    }
}
