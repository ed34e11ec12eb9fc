use std::error::Error;

use crate::error::ErrorKind;
use crate::request::ModelRequest;
use crate::response::ModelResponse;

/// Errors produced by a [`ModelProvider`].
pub trait ModelProviderError: Error + Send + Sync + 'static {
    /// Classifies the failure.
    fn kind(&self) -> ErrorKind;
}

/// Entry point to a hosted model.
///
/// A provider is treated as stateless by its callers: the same provider is
/// shared by concurrent agent runs, and every call to
/// [`send_request`](Self::send_request) must be self-contained.
pub trait ModelProvider: Send + Sync {
    /// Error type for failed requests and failed streams.
    type Error: ModelProviderError;

    /// Streamed response type.
    type Response: ModelResponse<Error = Self::Error>;

    /// Starts a request.
    ///
    /// The returned future must not borrow `self` or `req`; everything it
    /// needs is captured when this method is called.
    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;
}
