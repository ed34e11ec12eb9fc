#[cfg(test)]
use std::collections::VecDeque;

use bytes::Bytes;
use reqwest::Response;

/// Reading the response body failed midway.
#[derive(Debug, PartialEq, Eq)]
pub struct Error(pub String);

/// Source of raw body chunks.
pub enum Chunks {
    Response(Response),
    #[cfg(test)]
    Preset(VecDeque<Bytes>),
}

impl Chunks {
    #[inline]
    pub fn from_response(response: Response) -> Self {
        Chunks::Response(response)
    }

    #[cfg(test)]
    pub fn from_preset<I: IntoIterator<Item = &'static [u8]>>(chunks: I) -> Self {
        Chunks::Preset(chunks.into_iter().map(Bytes::from_static).collect())
    }

    /// Returns the next chunk, `None` once the body is exhausted.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        match self {
            Chunks::Response(response) => response
                .chunk()
                .await
                .map_err(|err| Error(err.to_string())),
            #[cfg(test)]
            Chunks::Preset(chunks) => Ok(chunks.pop_front()),
        }
    }
}
