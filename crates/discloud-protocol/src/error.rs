//! Error types for decoding API bodies.

/// Failure to decode a response body into its typed form.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid JSON in {what} response: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ProtocolError {
    /// Wrap a serde error with the name of the response being decoded.
    pub fn decode(what: &'static str, source: serde_json::Error) -> Self {
        Self::Decode { what, source }
    }

    pub fn from_encode(source: serde_json::Error) -> Self {
        Self::Encode(source)
    }
}
