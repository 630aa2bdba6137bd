// Unless explicitly stated otherwise all files in this repository are licensed under the Apache License Version 2.0.

//! Property tests for the round-trip and transform guarantees named in the
//! data model: encode/decode fidelity (P1, P3, P4), scale linearity (P6),
//! and copy independence (P7). Lives inside `src` (not `tests/`) so it can
//! reach the private table fields the way `lib.rs`'s own unit tests do.

use proptest::prelude::*;

use crate::{api, linker, Profile};

fn arb_sample_types() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec(("[a-z]{1,8}", "[a-z]{1,8}"), 1..4)
}

fn build_profile(sample_types: &[(String, String)], values: &[Vec<i64>]) -> Profile {
    let api_types: Vec<api::ValueType> = sample_types
        .iter()
        .map(|(t, u)| api::ValueType { r#type: t, unit: u })
        .collect();
    let mut profile = Profile::builder().sample_types(api_types).build();

    for (i, values) in values.iter().enumerate() {
        let function = api::Function {
            name: "f",
            system_name: "f",
            filename: "f.rs",
            start_line: i as i64,
        };
        let location = api::Location {
            mapping: None,
            address: i as u64,
            lines: vec![api::Line { function, line: i as i64 }],
        };
        profile
            .add(api::Sample {
                locations: vec![location],
                values: values.clone(),
                labels: vec![],
                num_labels: vec![],
            })
            .expect("add to succeed");
    }
    profile
}

proptest! {
    // P1 (round-trip): decode(encode(p)) has the same samples and values as p.
    #[test]
    fn round_trip_preserves_samples(
        sample_types in arb_sample_types(),
        sample_count in 0usize..5,
    ) {
        let n = sample_types.len();
        let samples: Vec<Vec<i64>> = (0..sample_count).map(|i| vec![i as i64; n]).collect();
        let profile = build_profile(&sample_types, &samples);

        let wire = linker::pre_encode(&profile);
        let decoded = linker::post_decode(wire).expect("decode to succeed");

        prop_assert_eq!(decoded.samples.len(), profile.samples.len());
        for (a, b) in decoded.samples.iter().zip(profile.samples.iter()) {
            prop_assert_eq!(&a.values, &b.values);
        }
    }

    // P3 (string-table canonicalization): after pre_encode, index 0 is "".
    #[test]
    fn pre_encode_keeps_empty_string_first(sample_types in arb_sample_types()) {
        let profile = build_profile(&sample_types, &[]);
        let wire = linker::pre_encode(&profile);
        prop_assert_eq!(wire.string_table.first().map(String::as_str), Some(""));
    }

    // P4 (validation totality): every profile produced by parsing valid
    // wire bytes passes check_valid.
    #[test]
    fn parsed_profiles_are_always_valid(sample_types in arb_sample_types()) {
        let profile = build_profile(&sample_types, &[]);
        let wire = linker::pre_encode(&profile);
        let decoded = linker::post_decode(wire).expect("decode to succeed");
        prop_assert!(decoded.check_valid().is_ok());
    }

    // P6 (scale linearity): scale(a) then scale(b) matches scale(a*b), up
    // to int64 rounding.
    #[test]
    fn scale_is_approximately_linear(
        sample_types in arb_sample_types(),
        value in 1i64..100_000,
        a in 0.1f64..5.0,
        b in 0.1f64..5.0,
    ) {
        let n = sample_types.len();
        let values = vec![value; n];
        let mut p1 = build_profile(&sample_types, &[values.clone()]);
        let mut p2 = build_profile(&sample_types, &[values]);

        crate::scale(&mut p1, a);
        crate::scale(&mut p1, b);
        crate::scale(&mut p2, a * b);

        for (v1, v2) in p1.samples[0].values.iter().zip(p2.samples[0].values.iter()) {
            // Two roundings vs. one can differ by a small amount.
            prop_assert!((v1 - v2).abs() <= 2);
        }
    }

    // P7 (copy independence): mutating the source after copy() leaves the
    // copy untouched.
    #[test]
    fn copy_is_independent(sample_types in arb_sample_types(), value in 1i64..100_000) {
        let n = sample_types.len();
        let mut profile = build_profile(&sample_types, &[vec![value; n]]);
        let copied = crate::copy(&profile);

        crate::scale(&mut profile, 2.0);

        prop_assert_eq!(&copied.samples[0].values, &vec![value; n]);
        prop_assert_eq!(profile.samples[0].values[0], value * 2);
    }
}
