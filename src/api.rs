// Licensed under the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0>

//! Borrowed, user-facing construction types.
//!
//! Callers building a [`crate::Profile`] live (as opposed to decoding one
//! from bytes) describe samples with these types; [`crate::Profile::add`]
//! interns their string fields and folds them into the profile's owned
//! tables.

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ValueType<'a> {
    pub r#type: &'a str,
    pub unit: &'a str,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Period<'a> {
    pub r#type: ValueType<'a>,
    pub value: i64,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Mapping<'a> {
    pub memory_start: u64,
    pub memory_limit: u64,
    pub file_offset: u64,
    pub filename: &'a str,
    pub build_id: &'a str,
    pub has_functions: bool,
    pub has_filenames: bool,
    pub has_line_numbers: bool,
    pub has_inline_frames: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Function<'a> {
    pub name: &'a str,
    pub system_name: &'a str,
    pub filename: &'a str,
    pub start_line: i64,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Line<'a> {
    pub function: Function<'a>,
    pub line: i64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Location<'a> {
    /// `None` when the mapping is unknown or not applicable.
    pub mapping: Option<Mapping<'a>>,
    pub address: u64,
    /// Outermost-inlined first, innermost last. Empty means unsymbolized.
    pub lines: Vec<Line<'a>>,
}

/// A single string-valued label, e.g. `("thread_name", "main")`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StringLabel<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

/// A single integer-valued label, e.g. `("pid", 1234)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NumLabel<'a> {
    pub key: &'a str,
    pub value: i64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sample<'a> {
    /// Innermost frame first.
    pub locations: Vec<Location<'a>>,
    pub values: Vec<i64>,
    pub labels: Vec<StringLabel<'a>>,
    pub num_labels: Vec<NumLabel<'a>>,
}
