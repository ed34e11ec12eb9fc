use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Broad classification of a provider failure.
///
/// Callers use the kind to decide what to do next: a rate-limited request
/// may be sent again later, everything else is reported as is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The provider refused to produce content for this request.
    Moderated,
    /// Too many requests were sent in a short period.
    RateLimitExceeded,
    /// Transport failures, malformed payloads and anything else.
    Other,
}

impl ErrorKind {
    /// Returns `true` if sending the same request again may succeed.
    #[inline]
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::RateLimitExceeded)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Moderated => f.write_str("content moderated"),
            ErrorKind::RateLimitExceeded => f.write_str("rate limit exceeded"),
            ErrorKind::Other => f.write_str("model provider error"),
        }
    }
}
