// Unless explicitly stated otherwise all files in this repository are licensed under the Apache License Version 2.0.

//! Whole-profile mutations: mapping cleanup, granularity reduction, and
//! value scaling. Each of these walks tables already built by decode or the
//! construction API; they never intern new strings, only rearrange or merge
//! the ids already present.

use std::collections::HashMap;

use regex::Regex;

use crate::{Error, PProfId, Profile};

/// Matches a shared-library suffix, e.g. `libc.so` or `libc.so.6` — used to
/// tell a real main binary apart from a `.so` that merely happens to sit
/// first in the mapping list.
const LIB_SUFFIX_PATTERN: &str = r"(\.so$|\.so[._][0-9]+)";

fn is_empty_string(strings: &indexmap::IndexSet<String>, id: PProfId) -> bool {
    strings
        .get_index(u64::from(id) as usize)
        .map_or(true, |s| s.is_empty())
}

/// Merges mapping `m` into its predecessor `lm` when they describe
/// contiguous regions of the same file split by the loader, moves the main
/// binary's mapping to the front, and renumbers the surviving mappings
/// `1..N` in their new order.
pub fn massage_mappings(profile: &mut Profile) {
    if profile.mappings.is_empty() {
        return;
    }

    let mappings = std::mem::take(&mut profile.mappings);
    let mut merged: Vec<crate::Mapping> = Vec::with_capacity(mappings.len());
    let mut redirect: HashMap<u64, u64> = HashMap::new();

    for mapping in mappings {
        let do_merge = merged.last().map_or(false, |lm| {
            lm.memory_limit == mapping.memory_start
                && lm.file_offset + (lm.memory_limit - lm.memory_start) == mapping.file_offset
                && (lm.filename == mapping.filename || is_empty_string(&profile.strings, lm.filename))
        });

        if do_merge {
            let lm = merged.last_mut().expect("do_merge implies a predecessor");
            if is_empty_string(&profile.strings, lm.filename) {
                lm.filename = mapping.filename;
            }
            lm.memory_limit = mapping.memory_limit;
            if is_empty_string(&profile.strings, lm.build_id) {
                lm.build_id = mapping.build_id;
            }
            redirect.insert(mapping.id, lm.id);
        } else {
            redirect.insert(mapping.id, mapping.id);
            merged.push(mapping);
        }
    }

    for location in profile.locations.iter_mut() {
        if let Some(&surviving_id) = redirect.get(&u64::from(location.mapping)) {
            location.mapping = PProfId::from(surviving_id);
        }
    }

    // Move the first mapping that looks like the main binary (a nonempty,
    // non-"(deleted)"-only, non-library, non-bracketed filename) to the
    // front.
    let lib_suffix = Regex::new(LIB_SUFFIX_PATTERN).expect("static pattern to compile");
    let main_index = merged.iter().position(|m| {
        let raw = profile.get_string(m.filename).unwrap_or("");
        let trimmed = raw.replace("(deleted)", "");
        let trimmed = trimmed.trim();
        !trimmed.is_empty() && !lib_suffix.is_match(trimmed) && !trimmed.starts_with('[')
    });
    if let Some(index) = main_index {
        if index != 0 {
            merged.swap(0, index);
        }
    }

    let mut renumber: HashMap<u64, u64> = HashMap::with_capacity(merged.len());
    for (index, mapping) in merged.iter_mut().enumerate() {
        let new_id = (index + 1) as u64;
        renumber.insert(mapping.id, new_id);
        mapping.id = new_id;
    }
    for location in profile.locations.iter_mut() {
        if let Some(&new_id) = renumber.get(&u64::from(location.mapping)) {
            location.mapping = PProfId::from(new_id);
        }
    }

    profile.next_mapping_id = merged.len() as u64 + 1;
    profile.mapping_cache.clear();
    profile.mappings = merged;
}

/// Reduces fidelity along the five named axes and revalidates. Does not
/// merge locations or samples that become identical as a result — ids and
/// row counts are otherwise left untouched, matching `massage_mappings`'
/// "only mappings are ever merged" contract.
#[allow(clippy::too_many_arguments)]
pub fn aggregate(
    profile: &mut Profile,
    inline_frame: bool,
    function: bool,
    filename: bool,
    line_number: bool,
    address: bool,
) -> Result<(), Error> {
    for mapping in profile.mappings.iter_mut() {
        mapping.has_functions &= function;
        mapping.has_filenames &= filename;
        mapping.has_line_numbers &= line_number;
        mapping.has_inline_frames &= inline_frame;
    }

    if !function {
        for f in profile.functions.iter_mut() {
            f.name = PProfId::NONE;
            f.system_name = PProfId::NONE;
        }
    }
    if !filename {
        for f in profile.functions.iter_mut() {
            f.filename = PProfId::NONE;
        }
    }

    for location in profile.locations.iter_mut() {
        if !inline_frame && location.lines.len() > 1 {
            let innermost = *location.lines.last().expect("len > 1 implies nonempty");
            location.lines = vec![innermost];
        }
        if !line_number {
            for line in location.lines.iter_mut() {
                line.line = 0;
            }
        }
        if !address {
            location.address = 0;
        }
    }

    profile.check_valid()
}

/// Scales every sample value by the same ratio. Conversion back to `i64`
/// truncates toward zero, matching `int64(float64(v) * r)`; no overflow
/// check is performed, and precision is lost for `|v| > 2^53` as in the
/// reference implementation.
pub fn scale(profile: &mut Profile, ratio: f64) {
    if ratio == 1.0 {
        return;
    }
    for sample in profile.samples.iter_mut() {
        for value in sample.values.iter_mut() {
            *value = (*value as f64 * ratio) as i64;
        }
    }
}

/// Scales each sample-type column independently, by its own ratio. Same
/// truncating conversion as [`scale`].
pub fn scale_n(profile: &mut Profile, ratios: &[f64]) -> Result<(), Error> {
    if ratios.len() != profile.sample_types.len() {
        return Err(Error::invalid_argument(format!(
            "scale_n called with {} ratios vs. {} sample types",
            ratios.len(),
            profile.sample_types.len()
        )));
    }
    if ratios.iter().all(|&r| r == 1.0) {
        return Ok(());
    }
    for sample in profile.samples.iter_mut() {
        for (value, &ratio) in sample.values.iter_mut().zip(ratios.iter()) {
            *value = (*value as f64 * ratio) as i64;
        }
    }
    Ok(())
}

fn mapping_for(profile: &Profile, id: PProfId) -> Option<&crate::Mapping> {
    profile.mappings.iter().find(|m| PProfId::from(m.id) == id)
}

/// True iff every location's mapping (where non-null) has `has_functions`
/// set. Vacuously true for a profile with no mapped locations.
pub fn has_functions(profile: &Profile) -> bool {
    profile.locations.iter().all(|l| {
        if l.mapping.is_none() {
            return true;
        }
        mapping_for(profile, l.mapping).map_or(false, |m| m.has_functions)
    })
}

/// True iff every location's mapping (where non-null) has `has_filenames`
/// and `has_line_numbers` set. Vacuously true for a profile with no mapped
/// locations.
pub fn has_file_lines(profile: &Profile) -> bool {
    profile.locations.iter().all(|l| {
        if l.mapping.is_none() {
            return true;
        }
        mapping_for(profile, l.mapping).map_or(false, |m| m.has_filenames && m.has_line_numbers)
    })
}

/// Deep-copies a profile by round-tripping it through the wire encoding.
pub fn copy(profile: &Profile) -> Profile {
    let wire = crate::linker::pre_encode(profile);
    crate::linker::post_decode(wire).expect("a profile built by pre_encode to decode cleanly")
}
