use thiserror::Error;

/// Non-fatal warning classes surfaced alongside seat bids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningCode {
    BidderLevelDebugDisabled,
    AlternateBidderCode,
    AdsCertSigner,
    Unknown,
}

/// Errors produced while requesting bids from one bidder. Every variant is
/// attached to the owning seat's error list; none of them abort the request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BidderError {
    /// The request-scoped deadline elapsed before the call completed.
    #[error("{0}")]
    Timeout(String),

    /// The endpoint answered outside the 2xx/3xx range. The response body is
    /// still retained for debug output.
    #[error("Server responded with failure status: {status}. Set request.test = 1 for debugging info.")]
    BadServerResponse { status: u16 },

    /// The adapter produced neither requests nor errors.
    #[error("The adapter failed to generate any bid requests, but also failed to generate an error explaining why")]
    FailedToRequestBids,

    #[error("{message}")]
    Warning { code: WarningCode, message: String },

    #[error("{0}")]
    Generic(String),
}

impl BidderError {
    pub fn warning(code: WarningCode, message: impl Into<String>) -> Self {
        BidderError::Warning { code, message: message.into() }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, BidderError::Warning { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BidderError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_server_response_message() {
        let err = BidderError::BadServerResponse { status: 503 };
        assert_eq!(
            err.to_string(),
            "Server responded with failure status: 503. Set request.test = 1 for debugging info."
        );
        assert!(!err.is_warning());
    }

    #[test]
    fn test_warning_classification() {
        let err = BidderError::warning(WarningCode::BidderLevelDebugDisabled, "debug turned off for bidder");
        assert!(err.is_warning());
        assert_eq!(err.to_string(), "debug turned off for bidder");
    }
}
