use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Why a single exchange call failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// Network or connectivity failure, or an unusable response.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The exchange refused the credentials.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The exchange understood the request and refused it.
    #[error("The exchange rejected the request: {0}")]
    Rejected(String),

    /// Exchange-side throttling. `retry_after` is the exchange's hint, if any.
    #[error("Rate limited by the exchange: {detail}")]
    RateLimited {
        retry_after: Option<Duration>,
        detail: String,
    },
}

/// The failure taxonomy, without the details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    Auth,
    Rejected,
    RateLimited,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Auth => "auth",
            ErrorKind::Rejected => "rejected",
            ErrorKind::RateLimited => "rateLimited",
        })
    }
}

impl ExchangeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExchangeError::Transport(_) => ErrorKind::Transport,
            ExchangeError::Auth(_) => ErrorKind::Auth,
            ExchangeError::Rejected(_) => ErrorKind::Rejected,
            ExchangeError::RateLimited { .. } => ErrorKind::RateLimited,
        }
    }

    /// Whether repeating the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::RateLimited)
    }

    /// The human-readable part, without the kind prefix.
    pub fn detail(&self) -> &str {
        match self {
            ExchangeError::Transport(detail)
            | ExchangeError::Auth(detail)
            | ExchangeError::Rejected(detail)
            | ExchangeError::RateLimited { detail, .. } => detail,
        }
    }

    /// Maps a non-success HTTP response onto the taxonomy.
    pub(crate) fn from_status(
        status: StatusCode,
        headers: &HeaderMap,
        message: String,
        now_unix: i64,
    ) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ExchangeError::Auth(message),
            StatusCode::TOO_MANY_REQUESTS => ExchangeError::RateLimited {
                retry_after: retry_after_from_headers(headers, now_unix),
                detail: message,
            },
            // 503 is the exchange's load-shedding answer; the request was not processed.
            s if s.is_server_error() => ExchangeError::Transport(format!("{}: {}", s, message)),
            _ => ExchangeError::Rejected(message),
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(e: reqwest::Error) -> Self {
        ExchangeError::Transport(e.to_string())
    }
}

/// Reads the exchange's retry hint: `Retry-After` in seconds, or else the
/// `x-ratelimit-reset` unix timestamp relative to `now_unix`.
pub fn retry_after_from_headers(headers: &HeaderMap, now_unix: i64) -> Option<Duration> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
    };

    if let Some(secs) = header("retry-after") {
        return Some(Duration::from_secs(secs.max(0) as u64));
    }
    header("x-ratelimit-reset")
        .map(|reset| reset - now_unix)
        .filter(|secs| *secs > 0)
        .map(|secs| Duration::from_secs(secs as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn retry_after_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("12"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1000"));
        assert_eq!(retry_after_from_headers(&headers, 900), Some(Duration::from_secs(12)));
    }

    #[test]
    fn reset_timestamp_is_relative_to_now() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1000"));
        assert_eq!(retry_after_from_headers(&headers, 970), Some(Duration::from_secs(30)));
        assert_eq!(retry_after_from_headers(&headers, 1000), None);
    }

    #[test]
    fn statuses_map_onto_the_taxonomy() {
        let headers = HeaderMap::new();
        let classify = |s| ExchangeError::from_status(s, &headers, "m".into(), 0).kind();
        assert_eq!(classify(StatusCode::UNAUTHORIZED), ErrorKind::Auth);
        assert_eq!(classify(StatusCode::FORBIDDEN), ErrorKind::Auth);
        assert_eq!(classify(StatusCode::TOO_MANY_REQUESTS), ErrorKind::RateLimited);
        assert_eq!(classify(StatusCode::SERVICE_UNAVAILABLE), ErrorKind::Transport);
        assert_eq!(classify(StatusCode::BAD_REQUEST), ErrorKind::Rejected);
        assert_eq!(classify(StatusCode::NOT_FOUND), ErrorKind::Rejected);
    }

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(ExchangeError::Transport("x".into()).is_retryable());
        assert!(ExchangeError::RateLimited { retry_after: None, detail: "x".into() }.is_retryable());
        assert!(!ExchangeError::Auth("x".into()).is_retryable());
        assert!(!ExchangeError::Rejected("x".into()).is_retryable());
    }
}
