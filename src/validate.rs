// Unless explicitly stated otherwise all files in this repository are licensed under the Apache License Version 2.0.

//! Structural validation run after every decode and before every transform:
//! nonzero/unique ids, resolved references, and sample value arity.

use std::collections::HashSet;

use crate::{Error, PProfId, Profile};

pub(crate) fn check_valid(profile: &Profile) -> Result<(), Error> {
    if profile.strings.get_index(0).map(String::as_str) != Some("") {
        return Err(Error::malformed("string_table[0] is not the empty string"));
    }

    check_unique_nonzero_ids(profile.mappings.iter().map(|m| m.id), "mapping")?;
    check_unique_nonzero_ids(profile.locations.iter().map(|l| l.id), "location")?;
    check_unique_nonzero_ids(profile.functions.iter().map(|f| f.id), "function")?;

    let mapping_ids: HashSet<u64> = profile.mappings.iter().map(|m| m.id).collect();
    let function_ids: HashSet<u64> = profile.functions.iter().map(|f| f.id).collect();
    let location_ids: HashSet<u64> = profile.locations.iter().map(|l| l.id).collect();

    for location in &profile.locations {
        if !location.mapping.is_none() && !mapping_ids.contains(&u64::from(location.mapping)) {
            return Err(Error::malformed(format!(
                "location {} references unknown mapping {}",
                location.id,
                u64::from(location.mapping)
            )));
        }
        for line in &location.lines {
            if !function_ids.contains(&u64::from(line.function)) {
                return Err(Error::malformed(format!(
                    "location {} references unknown function {}",
                    location.id,
                    u64::from(line.function)
                )));
            }
        }
    }

    check_string_ref(profile, profile.drop_frames, "drop_frames")?;
    check_string_ref(profile, profile.keep_frames, "keep_frames")?;
    check_string_ref(profile, profile.default_sample_type, "default_sample_type")?;
    for &comment in &profile.comments {
        check_string_ref(profile, comment, "comment")?;
    }
    for sample_type in &profile.sample_types {
        check_string_ref(profile, sample_type.type_, "sample_type.type")?;
        check_string_ref(profile, sample_type.unit, "sample_type.unit")?;
    }
    if let Some(period_type) = &profile.period_type {
        check_string_ref(profile, period_type.type_, "period_type.type")?;
        check_string_ref(profile, period_type.unit, "period_type.unit")?;
    }
    for mapping in &profile.mappings {
        check_string_ref(profile, mapping.filename, "mapping.filename")?;
        check_string_ref(profile, mapping.build_id, "mapping.build_id")?;
    }
    for function in &profile.functions {
        check_string_ref(profile, function.name, "function.name")?;
        check_string_ref(profile, function.system_name, "function.system_name")?;
        check_string_ref(profile, function.filename, "function.filename")?;
    }

    if !profile.samples.is_empty() && profile.sample_types.is_empty() {
        return Err(Error::malformed("profile has samples but no sample_type"));
    }

    for sample in &profile.samples {
        if sample.values.len() != profile.sample_types.len() {
            return Err(Error::malformed(format!(
                "mismatch: sample has: {} values vs. {} types",
                sample.values.len(),
                profile.sample_types.len()
            )));
        }
        for &location in &sample.locations {
            if !location_ids.contains(&u64::from(location)) {
                return Err(Error::malformed(format!(
                    "sample references unknown location {}",
                    u64::from(location)
                )));
            }
        }
        for &(key, value) in &sample.labels {
            check_string_ref(profile, key, "label.key")?;
            check_string_ref(profile, value, "label.str")?;
        }
        for &(key, _) in &sample.num_labels {
            check_string_ref(profile, key, "num_label.key")?;
        }
    }

    Ok(())
}

fn check_unique_nonzero_ids(
    ids: impl Iterator<Item = u64>,
    kind: &str,
) -> Result<(), Error> {
    let mut seen = HashSet::new();
    for id in ids {
        if id == 0 {
            return Err(Error::malformed(format!("{kind} has a zero id")));
        }
        if !seen.insert(id) {
            return Err(Error::malformed(format!("duplicate {kind} id {id}")));
        }
    }
    Ok(())
}

fn check_string_ref(profile: &Profile, id: PProfId, field: &str) -> Result<(), Error> {
    if profile.get_string(id).is_none() {
        return Err(Error::malformed(format!(
            "{field} references out-of-range string index {}",
            u64::from(id)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pprof;

    fn minimal_wire() -> pprof::Profile {
        pprof::Profile {
            string_table: vec!["".into(), "samples".into(), "count".into()],
            sample_type: vec![pprof::ValueType { r#type: 1, unit: 2 }],
            ..Default::default()
        }
    }

    #[test]
    fn accepts_minimal_profile() {
        let wire = minimal_wire();
        let profile = crate::linker::post_decode(wire).unwrap();
        assert!(check_valid(&profile).is_ok());
    }

    #[test]
    fn rejects_duplicate_mapping_id() {
        let mut wire = minimal_wire();
        wire.mapping = vec![
            pprof::Mapping {
                id: 1,
                ..Default::default()
            },
            pprof::Mapping {
                id: 1,
                ..Default::default()
            },
        ];
        let profile = crate::linker::post_decode(wire).unwrap();
        assert!(check_valid(&profile).is_err());
    }

    #[test]
    fn rejects_sample_value_arity_mismatch() {
        let mut wire = minimal_wire();
        wire.sample = vec![pprof::Sample {
            location_id: vec![],
            value: vec![1, 2],
            label: vec![],
        }];
        let profile = crate::linker::post_decode(wire).unwrap();
        let err = check_valid(&profile).unwrap_err();
        match err {
            Error::Malformed(msg) => assert!(msg.contains("mismatch: sample has: 2 values vs. 1 types")),
            _ => panic!("expected Malformed"),
        }
    }

    #[test]
    fn rejects_dangling_location_reference() {
        let mut wire = minimal_wire();
        wire.sample = vec![pprof::Sample {
            location_id: vec![99],
            value: vec![1],
            label: vec![],
        }];
        let profile = crate::linker::post_decode(wire).unwrap();
        assert!(check_valid(&profile).is_err());
    }

    #[test]
    fn rejects_negative_string_index_instead_of_treating_it_as_absent() {
        // A wire int64 is two's-complement, not zigzag (spec.md §4.2); a
        // negative `function.name` must fail the out-of-range check in
        // `check_string_ref`, not alias onto the "absent" (index 0)
        // sentinel and sail through as valid.
        let mut wire = minimal_wire();
        wire.function = vec![pprof::Function {
            id: 1,
            name: -1,
            ..Default::default()
        }];
        let profile = crate::linker::post_decode(wire).unwrap();
        assert!(check_valid(&profile).is_err());
    }
}
