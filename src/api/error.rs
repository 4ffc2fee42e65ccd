use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Failures surfaced by the catalog client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-2xx response. The body carries no guaranteed shape, so only the
    /// status line is kept.
    #[error("API Error: {status} {status_text}")]
    FetchFailed { status: u16, status_text: String },

    /// Body was not JSON, or not the expected shape.
    #[error("decode {url}: {source}")]
    DecodeFailed {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The request never produced a status (DNS, TLS, connection reset...).
    #[error("GET {url}: {message}")]
    Transport { url: String, message: String },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::FetchFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The source answers 404 both for unknown ids and for filters that match nothing.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub(crate) fn fetch_failed(status: u16, status_text: impl Into<String>) -> Self {
        Self::FetchFailed {
            status,
            status_text: status_text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ApiError;

    #[test]
    fn display_matches_status_line() {
        let err = ApiError::fetch_failed(404, "Not Found");
        assert_eq!(err.to_string(), "API Error: 404 Not Found");
        assert!(err.is_not_found());
    }

    #[test]
    fn transport_errors_have_no_status() {
        let err = ApiError::Transport {
            url: "https://example.test/character".into(),
            message: "connection refused".into(),
        };
        assert_eq!(err.status(), None);
        assert!(!err.is_not_found());
    }
}
