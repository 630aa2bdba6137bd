// Licensed under the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0>

use core::fmt;

/// Errors surfaced by the public parse/encode/transform operations.
///
/// `Unrecognized` is only meaningful as an intermediate result handed
/// between the top-level dispatcher and a [`crate::legacy::LegacyDecoder`];
/// callers of [`crate::parse`] never see it directly (the final "no format
/// matched" case is reported as [`Error::Malformed`]).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Input was syntactically or structurally invalid: truncated, a bad
    /// tag, an unresolved or duplicate or zero id, a string index out of
    /// range, a label with both or neither of `str`/`num` set, or a
    /// sample whose value count doesn't match `sample_type`.
    #[error("malformed profile: {0}")]
    Malformed(String),

    /// No decoder (protobuf or legacy) recognized the input.
    #[error("unrecognized profile format")]
    Unrecognized,

    /// Caller misuse detected synchronously, e.g. `scale_n` called with the
    /// wrong number of ratios.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The profile's id space is exhausted; see [`FullError`].
    #[error(transparent)]
    Full(#[from] FullError),
}

impl Error {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::Malformed(msg.into())
    }

    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

impl From<prost::DecodeError> for Error {
    fn from(e: prost::DecodeError) -> Self {
        Error::Malformed(e.to_string())
    }
}

impl From<prost::EncodeError> for Error {
    fn from(e: prost::EncodeError) -> Self {
        // `Vec<u8>` buffers never run out of remaining capacity, so in
        // practice this only fires if a future caller passes a
        // fixed-capacity buffer; treat it like any other malformed-output
        // condition rather than adding a rarely-reachable error kind.
        Error::Malformed(format!("encode failed: {e}"))
    }
}

/// The profile's mapping/location/function tables are capped so that ids
/// (1-based, allocated sequentially) never overflow a `u32`. Returned by the
/// construction API once that cap is hit.
#[derive(Debug)]
pub struct FullError;

impl fmt::Display for FullError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "profile table is full")
    }
}

impl std::error::Error for FullError {}
