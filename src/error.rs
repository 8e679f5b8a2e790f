#![allow(
    clippy::module_name_repetitions,
    reason = "Error suffix is for readability"
)]
use std::{fmt, io::Error as StdIoError};

/// Main error type for Ecocompteur client operations.
///
/// Cloneable so the coordinator can keep the last failure around next to the cached snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The device could not be reached or did not answer with HTTP 200.
    #[error("Device unreachable at {url}: {reason}")]
    DeviceUnreachable {
        /// Url of the request that failed.
        url: String,
        /// Why the device is considered unreachable.
        reason: UnreachableReason,
    },

    /// The device answered, but the payload could not be understood.
    #[error("Malformed response from {url}: {reason}")]
    MalformedResponse {
        /// Url of the request that returned the payload.
        url: String,
        /// Description of what is wrong with the payload.
        reason: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl ClientError {
    /// Returns true for errors caused by the device not answering properly.
    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::DeviceUnreachable { .. })
    }
}

/// Transport level failure kinds, all surfaced as [`ClientError::DeviceUnreachable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnreachableReason {
    /// No response within the request timeout.
    Timeout,
    /// Connection refused, host unreachable or name resolution failure.
    Connect,
    /// Any status other than 200.
    Status(u16),
    /// Connection dropped or body could not be read.
    Transport,
}

impl fmt::Display for UnreachableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("request timed out"),
            Self::Connect => f.write_str("connection failed"),
            Self::Status(code) => write!(f, "unexpected HTTP status {code}"),
            Self::Transport => f.write_str("transport error"),
        }
    }
}

/// Config entry storage and migration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read or write the entry store.
    #[error("Entry store {path} is not accessible: {source}")]
    Io {
        /// Path of the entry store.
        path: String,
        /// Source IO error.
        #[source]
        source: StdIoError,
    },

    /// Entry store content could not be (de)serialized.
    #[error("Invalid entry store content: {source}")]
    Serialization {
        /// Source serde error.
        #[source]
        source: serde_json::Error,
    },

    /// Entry was written by a newer schema than the one supported.
    #[error("Unsupported config entry version {version}")]
    UnsupportedVersion {
        /// Version found in the stored entry.
        version: u32,
    },
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization { source: err }
    }
}

/// Errors reported to the user while creating a config entry.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFlowError {
    /// Host is neither an IP address nor a resolvable hostname.
    #[error("Invalid host: {host}")]
    InvalidHost {
        /// Host as entered by the user.
        host: String,
    },

    /// The device did not answer the probe request.
    #[error("Cannot connect to {host}: {source}")]
    CannotConnect {
        /// Host as entered by the user.
        host: String,
        /// Error returned by the probe.
        #[source]
        source: ClientError,
    },

    /// An entry for the same host already exists.
    #[error("Device {host} is already configured")]
    AlreadyConfigured {
        /// Host as entered by the user.
        host: String,
    },
}

impl ConfigFlowError {
    /// Translation key shown next to the form, mirroring the host UI conventions.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::InvalidHost { .. } => "invalid_host",
            Self::CannotConnect { .. } => "cannot_connect",
            Self::AlreadyConfigured { .. } => "already_configured",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_display() {
        let err = ClientError::DeviceUnreachable {
            url: "http://10.0.0.2/data.json".to_owned(),
            reason: UnreachableReason::Status(503),
        };
        assert_eq!(
            err.to_string(),
            "Device unreachable at http://10.0.0.2/data.json: unexpected HTTP status 503"
        );
        assert!(err.is_unreachable());
    }

    #[test]
    fn test_malformed_is_not_unreachable() {
        let err = ClientError::MalformedResponse {
            url: "http://10.0.0.2/inst.json".to_owned(),
            reason: "expected a JSON object".to_owned(),
        };
        assert!(!err.is_unreachable());
    }

    #[test]
    fn test_config_flow_error_keys() {
        let err = ConfigFlowError::CannotConnect {
            host: "10.0.0.2".to_owned(),
            source: ClientError::DeviceUnreachable {
                url: "http://10.0.0.2/data.json".to_owned(),
                reason: UnreachableReason::Timeout,
            },
        };
        assert_eq!(err.key(), "cannot_connect");
        assert_eq!(
            ConfigFlowError::InvalidHost {
                host: "not a host".to_owned()
            }
            .key(),
            "invalid_host"
        );
    }
}
