// Licensed under the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0>

use std::convert::TryInto;

/// A 1-based id into one of the profile's tables (mapping, location,
/// function, or string), or 0 to mean "absent" — mirrored directly from the
/// wire format, where index/id 0 always means the reference is unset.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PProfId(pub(crate) u64);

impl PProfId {
    pub const NONE: PProfId = PProfId(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl From<&PProfId> for u64 {
    fn from(id: &PProfId) -> Self {
        id.0
    }
}

impl From<PProfId> for u64 {
    fn from(id: PProfId) -> Self {
        id.0
    }
}

impl From<&PProfId> for i64 {
    fn from(value: &PProfId) -> Self {
        value.0.try_into().unwrap_or(0)
    }
}

impl From<PProfId> for i64 {
    fn from(value: PProfId) -> Self {
        value.0.try_into().unwrap_or(0)
    }
}

impl From<u64> for PProfId {
    fn from(value: u64) -> Self {
        PProfId(value)
    }
}

/// Wire string-table indices are encoded as `int64`; negative values never
/// occur in valid input, but a decoder must not panic on them either. A
/// negative value is reinterpreted bit-for-bit as a (huge) `u64` rather than
/// collapsed to 0 — 0 is the wire's reserved "absent" sentinel, and mapping
/// an out-of-range index onto it would make a malformed profile look valid
/// to every table-bounds check downstream.
impl From<i64> for PProfId {
    fn from(value: i64) -> Self {
        PProfId(value as u64)
    }
}
