// Unless explicitly stated otherwise all files in this repository are licensed under the Apache License Version 2.0.

//! Bridges the reference-based in-memory [`crate::Profile`] and the
//! index-based wire representation in [`crate::pprof`].
//!
//! [`pre_encode`] walks a `Profile`'s tables and produces a `pprof::Profile`
//! ready to protobuf-encode. [`post_decode`] does the reverse: it takes a
//! freshly-decoded `pprof::Profile` and resolves every id into a `Profile`,
//! without deduplicating anything the wire format didn't already dedupe —
//! decode must be faithful, not normalizing, so that malformed input (a
//! duplicate id, a dangling reference) survives to be caught by
//! [`crate::validate::check_valid`] instead of being silently merged away.

use std::convert::TryInto;

use crate::{pprof, Error, Function, Line, Location, Mapping, PProfId, Profile, Sample, ValueType};

pub(crate) fn pre_encode(profile: &Profile) -> pprof::Profile {
    pprof::Profile {
        sample_type: profile.sample_types.iter().map(value_type_to_wire).collect(),
        sample: profile.samples.iter().map(|s| sample_to_wire(s)).collect(),
        mapping: profile.mappings.iter().map(mapping_to_wire).collect(),
        location: profile.locations.iter().map(location_to_wire).collect(),
        function: profile.functions.iter().map(function_to_wire).collect(),
        string_table: profile.strings.iter().cloned().collect(),
        drop_frames: profile.drop_frames.into(),
        keep_frames: profile.keep_frames.into(),
        time_nanos: profile.wire_time_nanos.unwrap_or_else(|| {
            profile
                .start_time
                .duration_since(std::time::SystemTime::UNIX_EPOCH)
                .map_or(0, |d| d.as_nanos() as i64)
        }),
        duration_nanos: profile
            .wire_duration_nanos
            .unwrap_or_else(|| profile.started_at.elapsed().as_nanos().try_into().unwrap_or(0)),
        period_type: profile.period_type.as_ref().map(value_type_to_wire),
        period: profile.period,
        comment: profile.comments.iter().map(|&c| c.into()).collect(),
        default_sample_type: profile.default_sample_type.into(),
    }
}

fn value_type_to_wire(vt: &ValueType) -> pprof::ValueType {
    pprof::ValueType {
        r#type: vt.type_.into(),
        unit: vt.unit.into(),
    }
}

fn sample_to_wire(sample: &Sample) -> pprof::Sample {
    let mut label: Vec<pprof::Label> = sample
        .labels
        .iter()
        .map(|&(key, value)| pprof::Label {
            key: key.into(),
            str: value.into(),
            num: 0,
        })
        .collect();
    label.extend(sample.num_labels.iter().map(|&(key, value)| pprof::Label {
        key: key.into(),
        str: 0,
        num: value,
    }));

    pprof::Sample {
        location_id: sample.locations.iter().map(Into::into).collect(),
        value: sample.values.clone(),
        label,
    }
}

fn mapping_to_wire(mapping: &Mapping) -> pprof::Mapping {
    pprof::Mapping {
        id: mapping.id,
        memory_start: mapping.memory_start,
        memory_limit: mapping.memory_limit,
        file_offset: mapping.file_offset,
        filename: mapping.filename.into(),
        build_id: mapping.build_id.into(),
        has_functions: mapping.has_functions,
        has_filenames: mapping.has_filenames,
        has_line_numbers: mapping.has_line_numbers,
        has_inline_frames: mapping.has_inline_frames,
    }
}

fn location_to_wire(location: &Location) -> pprof::Location {
    pprof::Location {
        id: location.id,
        mapping_id: location.mapping.into(),
        address: location.address,
        line: location
            .lines
            .iter()
            .map(|l| pprof::Line {
                function_id: l.function.into(),
                line: l.line,
            })
            .collect(),
    }
}

fn function_to_wire(function: &Function) -> pprof::Function {
    let start_line: u64 = function.start_line.into();
    pprof::Function {
        id: function.id,
        name: function.name.into(),
        system_name: function.system_name.into(),
        filename: function.filename.into(),
        start_line: start_line.try_into().unwrap_or(0),
    }
}

/// Resolves a freshly-decoded wire profile into a `Profile`. Ids are taken
/// verbatim from the wire (not renumbered), so duplicate or zero ids in the
/// input round-trip into the `Profile` as-is for [`crate::validate`] to
/// reject.
pub(crate) fn post_decode(wire: pprof::Profile) -> Result<Profile, Error> {
    let mut profile = Profile::new();
    // `Profile::new` already interned the empty string at index 0; replace
    // the whole string table with the wire's own, which must also have "" at
    // index 0 (checked by `check_valid`).
    profile.strings = wire.string_table.into_iter().collect();

    profile.sample_types = wire.sample_type.iter().map(wire_value_type).collect();
    profile.period_type = wire.period_type.as_ref().map(wire_value_type);
    profile.period = wire.period;
    profile.default_sample_type = wire.default_sample_type.into();
    profile.drop_frames = wire.drop_frames.into();
    profile.keep_frames = wire.keep_frames.into();
    profile.comments = wire.comment.into_iter().map(PProfId::from).collect();
    profile.wire_time_nanos = Some(wire.time_nanos);
    profile.wire_duration_nanos = Some(wire.duration_nanos);
    profile.start_time = std::time::SystemTime::UNIX_EPOCH + std::time::Duration::from_nanos(wire.time_nanos.max(0) as u64);

    profile.mappings = wire
        .mapping
        .iter()
        .map(|m| Mapping {
            id: m.id,
            memory_start: m.memory_start,
            memory_limit: m.memory_limit,
            file_offset: m.file_offset,
            filename: m.filename.into(),
            build_id: m.build_id.into(),
            has_functions: m.has_functions,
            has_filenames: m.has_filenames,
            has_line_numbers: m.has_line_numbers,
            has_inline_frames: m.has_inline_frames,
        })
        .collect();

    profile.functions = wire
        .function
        .iter()
        .map(|f| Function {
            id: f.id,
            name: f.name.into(),
            system_name: f.system_name.into(),
            filename: f.filename.into(),
            start_line: ux::u63::new(f.start_line.max(0) as u64),
        })
        .collect();

    profile.locations = wire
        .location
        .iter()
        .map(|l| Location {
            id: l.id,
            mapping: l.mapping_id.into(),
            address: l.address,
            lines: l
                .line
                .iter()
                .map(|line| Line {
                    function: line.function_id.into(),
                    line: line.line,
                })
                .collect(),
        })
        .collect();

    let mut samples = Vec::with_capacity(wire.sample.len());
    for s in wire.sample.iter() {
        let locations = s.location_id.iter().map(|&id| PProfId::from(id)).collect();
        let mut labels = Vec::new();
        let mut num_labels = Vec::new();
        for label in s.label.iter() {
            let key = PProfId::from(label.key);
            let has_str = label.str != 0;
            let has_num = label.num != 0;
            match (has_str, has_num) {
                (true, true) => return Err(Error::malformed("label has both str and num set")),
                (false, false) => return Err(Error::malformed("label has neither str nor num set")),
                (true, false) => labels.push((key, PProfId::from(label.str))),
                (false, true) => num_labels.push((key, label.num)),
            }
        }
        samples.push(Sample {
            locations,
            values: s.value.clone(),
            labels,
            num_labels,
        });
    }
    profile.samples = samples;

    // next_*_id / *_cache are only consulted by the add()-family
    // construction API; a decoded profile that's later mutated via add()
    // would risk id collisions with these defaults, which is out of scope
    // for a profile whose purpose is decode -> validate -> inspect/encode.
    let max_mapping_id = profile.mappings.iter().map(|m| m.id).max().unwrap_or(0);
    let max_location_id = profile.locations.iter().map(|l| l.id).max().unwrap_or(0);
    let max_function_id = profile.functions.iter().map(|f| f.id).max().unwrap_or(0);
    profile.next_mapping_id = max_mapping_id + 1;
    profile.next_location_id = max_location_id + 1;
    profile.next_function_id = max_function_id + 1;

    Ok(profile)
}

fn wire_value_type(vt: &pprof::ValueType) -> ValueType {
    ValueType {
        type_: vt.r#type.into(),
        unit: vt.unit.into(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api;

    #[test]
    fn round_trips_labels() {
        let sample_types = vec![api::ValueType {
            r#type: "samples",
            unit: "count",
        }];
        let mut profile = Profile::builder().sample_types(sample_types).build();
        profile
            .add(api::Sample {
                locations: vec![],
                values: vec![1],
                labels: vec![api::StringLabel {
                    key: "thread_name",
                    value: "main",
                }],
                num_labels: vec![api::NumLabel { key: "pid", value: 42 }],
            })
            .unwrap();

        let wire = pre_encode(&profile);
        let decoded = post_decode(wire).expect("decode to succeed");

        assert_eq!(decoded.samples.len(), 1);
        assert_eq!(decoded.samples[0].labels.len(), 1);
        assert_eq!(decoded.samples[0].num_labels.len(), 1);
        assert_eq!(
            decoded.get_string(decoded.samples[0].labels[0].0).unwrap(),
            "thread_name"
        );
        assert_eq!(decoded.samples[0].num_labels[0].1, 42);
    }

    #[test]
    fn rejects_label_with_both_str_and_num() {
        let wire = pprof::Profile {
            string_table: vec!["".into(), "key".into(), "val".into()],
            sample: vec![pprof::Sample {
                location_id: vec![],
                value: vec![1],
                label: vec![pprof::Label {
                    key: 1,
                    str: 2,
                    num: 5,
                }],
            }],
            ..Default::default()
        };

        let err = post_decode(wire).unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
    }

    #[test]
    fn rejects_label_with_neither_str_nor_num_set() {
        let wire = pprof::Profile {
            string_table: vec!["".into(), "key".into()],
            sample: vec![pprof::Sample {
                location_id: vec![],
                value: vec![1],
                label: vec![pprof::Label {
                    key: 1,
                    str: 0,
                    num: 0,
                }],
            }],
            ..Default::default()
        };

        let err = post_decode(wire).unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
    }
}
