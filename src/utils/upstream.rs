//! Transport plumbing shared by the upstream clients.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;

/// Failure talking to a third-party provider.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request to {provider} failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned HTTP {status}")]
    Status { provider: &'static str, status: u16 },

    #[error("{provider} rate limited the request")]
    RateLimited { provider: &'static str },

    #[error("{provider} returned an unreadable payload: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} reported an error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} has no data for {item}")]
    Missing {
        provider: &'static str,
        item: String,
    },
}

impl UpstreamError {
    pub fn transport(provider: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| Self::Transport { provider, source }
    }

    pub fn decode(provider: &'static str, error: impl std::fmt::Display) -> Self {
        Self::Decode {
            provider,
            message: error.to_string(),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Map a non-2xx status to an error; 429 gets its own variant so callers
/// can decide whether to retry.
pub fn check_status(provider: &'static str, status: StatusCode) -> Result<(), UpstreamError> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Err(UpstreamError::RateLimited { provider })
    } else {
        Err(UpstreamError::Status {
            provider,
            status: status.as_u16(),
        })
    }
}

/// Client with a per-request timeout; a timeout cancels only the call it
/// belongs to.
pub fn http_client(user_agent: Option<&str>, timeout_ms: u64) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .pool_max_idle_per_host(4);
    if let Some(user_agent) = user_agent {
        builder = builder.user_agent(user_agent.to_string());
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_many_requests_is_rate_limited() {
        let error = check_status("open-meteo", StatusCode::TOO_MANY_REQUESTS).unwrap_err();
        assert!(error.is_rate_limited());
    }

    #[test]
    fn other_failures_carry_status() {
        let error = check_status("steam", StatusCode::SERVICE_UNAVAILABLE).unwrap_err();
        assert!(!error.is_rate_limited());
        assert_eq!(error.to_string(), "steam returned HTTP 503");
    }

    #[test]
    fn success_passes() {
        assert!(check_status("aladin", StatusCode::OK).is_ok());
    }
}
