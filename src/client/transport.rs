use reqwest::StatusCode;
use serde_json::Value;

use super::endpoint::Endpoint;
use crate::error::{ClientError, UnreachableReason};

/// Performs a single GET against the device and returns the body of a 200 response.
///
/// Every transport failure is folded into [`ClientError::DeviceUnreachable`] so callers never see
/// the http client's own error type.
pub(super) async fn get(
    http: &reqwest::Client,
    host: &str,
    endpoint: Endpoint,
) -> Result<String, ClientError> {
    let url = endpoint.url(host);
    tracing::debug!("GET {url}");
    let response = http
        .get(&url)
        .send()
        .await
        .map_err(|e| unreachable(&url, &e))?;

    let status = response.status();
    tracing::debug!("{url} answered {status}");
    if status != StatusCode::OK {
        return Err(ClientError::DeviceUnreachable {
            url,
            reason: UnreachableReason::Status(status.as_u16()),
        });
    }

    response.text().await.map_err(|e| unreachable(&url, &e))
}

/// Same as [`get`], parsing the body as JSON.
pub(super) async fn get_json(
    http: &reqwest::Client,
    host: &str,
    endpoint: Endpoint,
) -> Result<Value, ClientError> {
    let body = get(http, host, endpoint).await?;
    parse_json(&endpoint.url(host), &body)
}

pub(super) fn parse_json(url: &str, body: &str) -> Result<Value, ClientError> {
    serde_json::from_str(body).map_err(|e| ClientError::MalformedResponse {
        url: url.to_owned(),
        reason: format!("invalid JSON: {e}"),
    })
}

fn unreachable(url: &str, err: &reqwest::Error) -> ClientError {
    let reason = if err.is_timeout() {
        UnreachableReason::Timeout
    } else if err.is_connect() {
        UnreachableReason::Connect
    } else {
        UnreachableReason::Transport
    };
    tracing::debug!("{url} failed: {err}");
    ClientError::DeviceUnreachable {
        url: url.to_owned(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_valid() {
        let value = parse_json("http://device/inst.json", r#"{"data1": 178.0}"#).unwrap();
        assert_eq!(value["data1"], 178.0);
    }

    #[test]
    fn test_parse_json_invalid() {
        let err = parse_json("http://device/data.json", "<html>oops</html>").unwrap_err();
        match err {
            ClientError::MalformedResponse { url, reason } => {
                assert_eq!(url, "http://device/data.json");
                assert!(reason.starts_with("invalid JSON"), "{reason}");
            }
            other => panic!("Expected MalformedResponse, got {other:?}"),
        }
    }
}
