// Unless explicitly stated otherwise all files in this repository are licensed under the Apache License Version 2.0.

//! Fallback decoders for profile formats that predate this crate's wire
//! schema, tried in order when protobuf decoding fails.
//!
//! This crate ships no legacy decoders of its own — the schema it decodes
//! natively covers every input it's expected to see. The registry exists so
//! a caller that still needs to read an older on-disk format can register
//! one without forking [`crate::parse_data`].

use crate::{Error, Profile};

/// A decoder for one legacy on-disk profile format.
///
/// Implementations should return [`Error::Unrecognized`] as soon as they
/// can tell the input isn't theirs (a bad magic number, wrong length) so
/// the dispatcher moves on to the next candidate. Any other `Err` is
/// treated as a fatal, non-recoverable parse failure and aborts the whole
/// fallback chain.
pub trait LegacyDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Profile, Error>;
}

/// Decoders are tried in this order; the first to return `Ok` or a
/// non-`Unrecognized` `Err` wins. Empty until a caller has a format to add.
static REGISTRY: &[&dyn LegacyDecoder] = &[];

pub(crate) fn try_decode(bytes: &[u8]) -> Result<Profile, Error> {
    for decoder in REGISTRY {
        match decoder.decode(bytes) {
            Err(Error::Unrecognized) => continue,
            result => return result,
        }
    }
    Err(Error::Unrecognized)
}
