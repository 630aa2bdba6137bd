// Unless explicitly stated otherwise all files in this repository are licensed under the Apache License Version 2.0.

//! Representation, decoding, encoding, and validation of sampled execution
//! profiles in a pprof-wire-compatible binary format.
//!
//! A [`Profile`] owns four dense, 1-based-id tables — mappings, locations,
//! functions, and (via [`Profile::add`]) samples — plus the string table
//! every other field's strings are interned into. [`parse`]/[`parse_data`]
//! decode a byte stream into a validated `Profile`; [`write`] does the
//! reverse. [`aggregate`], [`scale`]/[`scale_n`], and [`massage_mappings`]
//! mutate a `Profile` in place.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::time::{Instant, SystemTime};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use indexmap::IndexSet;
use prost::Message;
use ux::u63;

pub mod api;
mod error;
mod ids;
mod legacy;
mod linker;
pub mod pprof;
#[cfg(test)]
mod proptests;
mod transform;
mod validate;

pub use error::{Error, FullError};
pub use ids::PProfId;
pub use legacy::LegacyDecoder;
pub use transform::{aggregate, copy, has_file_lines, has_functions, massage_mappings, scale, scale_n};

/// Since ids are allocated sequentially starting at 1, tables are capped
/// well under `u64::MAX` so an id can never wrap. `u32::MAX` is generous
/// for any single profile; hitting this cap signals a runaway profiler
/// rather than legitimate load.
const CONTAINER_MAX: u64 = (u32::MAX - 1) as u64;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
struct ValueType {
    type_: PProfId,
    unit: PProfId,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash)]
struct Mapping {
    id: u64,
    memory_start: u64,
    memory_limit: u64,
    file_offset: u64,
    filename: PProfId,
    build_id: PProfId,
    has_functions: bool,
    has_filenames: bool,
    has_line_numbers: bool,
    has_inline_frames: bool,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash)]
struct Function {
    id: u64,
    name: PProfId,
    system_name: PProfId,
    filename: PProfId,
    start_line: u63,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash)]
struct Line {
    function: PProfId,
    line: i64,
}

#[derive(Clone, Eq, PartialEq, Hash)]
struct Location {
    id: u64,
    /// `PProfId::NONE` when the location has no mapping.
    mapping: PProfId,
    address: u64,
    /// Outermost-inlined first, innermost last; empty if unsymbolized.
    lines: Vec<Line>,
}

type SampleKey = (Vec<PProfId>, Vec<(PProfId, PProfId)>, Vec<(PProfId, i64)>);

#[derive(Clone, Eq, PartialEq, Hash)]
struct Sample {
    /// Innermost frame first.
    locations: Vec<PProfId>,
    values: Vec<i64>,
    /// Key -> string value, in first-seen order. A multimap: a key may
    /// repeat.
    labels: Vec<(PProfId, PProfId)>,
    /// Key -> integer value, same shape as `labels`.
    num_labels: Vec<(PProfId, i64)>,
}

/// A sampled execution profile: samples, the call-stack graph they
/// reference (locations/mappings/functions), and profile-wide metadata.
///
/// Not `Sync`-safe for concurrent mutation; build one up from a single
/// thread (or behind your own lock) and hand it off once complete.
pub struct Profile {
    sample_types: Vec<ValueType>,
    default_sample_type: PProfId,
    samples: Vec<Sample>,
    sample_index: HashMap<SampleKey, usize>,
    mappings: Vec<Mapping>,
    #[allow(clippy::type_complexity)]
    mapping_cache: HashMap<(u64, u64, u64, PProfId, PProfId, bool, bool, bool, bool), u64>,
    locations: Vec<Location>,
    location_cache: HashMap<(PProfId, u64, Vec<Line>), u64>,
    functions: Vec<Function>,
    function_cache: HashMap<(PProfId, PProfId, PProfId, u63), u64>,
    strings: IndexSet<String>,
    comments: Vec<PProfId>,
    drop_frames: PProfId,
    keep_frames: PProfId,
    started_at: Instant,
    start_time: SystemTime,
    /// Set when this profile came from `parse`; read back verbatim on
    /// encode instead of being derived from `start_time`/`started_at`.
    wire_time_nanos: Option<i64>,
    wire_duration_nanos: Option<i64>,
    period: i64,
    period_type: Option<ValueType>,
    next_mapping_id: u64,
    next_location_id: u64,
    next_function_id: u64,
}

pub struct ProfileBuilder<'a> {
    sample_types: Vec<api::ValueType<'a>>,
    period: Option<api::Period<'a>>,
    comments: Vec<&'a str>,
    drop_frames: &'a str,
    keep_frames: &'a str,
    default_sample_type: Option<&'a str>,
}

impl<'a> ProfileBuilder<'a> {
    pub fn new() -> Self {
        ProfileBuilder {
            sample_types: vec![],
            period: None,
            comments: vec![],
            drop_frames: "",
            keep_frames: "",
            default_sample_type: None,
        }
    }

    pub fn sample_types(mut self, mut sample_types: Vec<api::ValueType<'a>>) -> Self {
        std::mem::swap(&mut self.sample_types, &mut sample_types);
        self
    }

    pub fn period(mut self, period: Option<api::Period<'a>>) -> Self {
        self.period = period;
        self
    }

    pub fn comments(mut self, mut comments: Vec<&'a str>) -> Self {
        std::mem::swap(&mut self.comments, &mut comments);
        self
    }

    pub fn drop_frames(mut self, pattern: &'a str) -> Self {
        self.drop_frames = pattern;
        self
    }

    pub fn keep_frames(mut self, pattern: &'a str) -> Self {
        self.keep_frames = pattern;
        self
    }

    pub fn default_sample_type(mut self, r#type: &'a str) -> Self {
        self.default_sample_type = Some(r#type);
        self
    }

    pub fn build(self) -> Profile {
        let mut profile = Profile::new();
        profile.sample_types = self
            .sample_types
            .iter()
            .map(|vt| ValueType {
                type_: profile.intern(vt.r#type),
                unit: profile.intern(vt.unit),
            })
            .collect();

        if let Some(p) = self.period {
            profile.period = p.value;
            profile.period_type = Some(ValueType {
                type_: profile.intern(p.r#type.r#type),
                unit: profile.intern(p.r#type.unit),
            });
        }

        profile.comments = self.comments.iter().map(|c| profile.intern(c)).collect();
        profile.drop_frames = profile.intern(self.drop_frames);
        profile.keep_frames = profile.intern(self.keep_frames);
        if let Some(t) = self.default_sample_type {
            profile.default_sample_type = profile.intern(t);
        }

        profile
    }
}

impl<'a> Default for ProfileBuilder<'a> {
    fn default() -> Self {
        Self::new()
    }
}

trait DedupExt {
    /// Returns the existing index for `s`, or interns it and returns the
    /// new one. The empty string always maps to index 0.
    fn dedup_ref(&mut self, s: &str) -> usize;
}

impl DedupExt for IndexSet<String> {
    fn dedup_ref(&mut self, s: &str) -> usize {
        match self.get_index_of(s) {
            Some(index) => index,
            None => {
                let (index, inserted) = self.insert_full(s.to_owned());
                // We just failed to find it, so inserting it must add a new
                // entry; anything else means `IndexSet` is broken.
                assert!(inserted);
                index
            }
        }
    }
}

pub struct EncodedProfile {
    pub start: SystemTime,
    pub end: SystemTime,
    pub buffer: Vec<u8>,
}

impl Profile {
    /// Creates a profile with "now" for the start time. Initializes the
    /// string table to include the empty string at index 0. All other
    /// fields are default.
    pub fn new() -> Self {
        // Do not use Profile's Default impl here, it calls this method.
        let mut profile = Self {
            sample_types: vec![],
            default_sample_type: PProfId::NONE,
            samples: vec![],
            sample_index: HashMap::new(),
            mappings: vec![],
            mapping_cache: HashMap::new(),
            locations: vec![],
            location_cache: HashMap::new(),
            functions: vec![],
            function_cache: HashMap::new(),
            strings: IndexSet::new(),
            comments: vec![],
            drop_frames: PProfId::NONE,
            keep_frames: PProfId::NONE,
            started_at: Instant::now(),
            start_time: SystemTime::now(),
            wire_time_nanos: None,
            wire_duration_nanos: None,
            period: 0,
            period_type: None,
            next_mapping_id: 1,
            next_location_id: 1,
            next_function_id: 1,
        };

        profile.intern("");
        profile
    }

    pub fn builder<'a>() -> ProfileBuilder<'a> {
        ProfileBuilder::new()
    }

    /// Interns `s`, returning its id in the string table. The empty string
    /// is special-cased to index/id 0, which the wire format also uses to
    /// mean "absent" for optional references.
    fn intern(&mut self, s: &str) -> PProfId {
        PProfId::from(self.strings.dedup_ref(s) as u64)
    }

    /// Resolves a string-table id back to its string, or `None` if `id` is
    /// out of range (a valid `PProfId::NONE` always resolves, to "").
    pub fn get_string(&self, id: PProfId) -> Option<&str> {
        self.strings.get_index(u64::from(id) as usize).map(String::as_str)
    }

    fn add_mapping(&mut self, mapping: &api::Mapping) -> Result<PProfId, FullError> {
        if self.strings.len() as u64 >= CONTAINER_MAX || self.mappings.len() as u64 >= CONTAINER_MAX {
            return Err(FullError);
        }

        let filename = self.intern(mapping.filename);
        let build_id = self.intern(mapping.build_id);
        let key = (
            mapping.memory_start,
            mapping.memory_limit,
            mapping.file_offset,
            filename,
            build_id,
            mapping.has_functions,
            mapping.has_filenames,
            mapping.has_line_numbers,
            mapping.has_inline_frames,
        );

        if let Some(&id) = self.mapping_cache.get(&key) {
            return Ok(PProfId::from(id));
        }

        let id = self.next_mapping_id;
        self.next_mapping_id += 1;
        self.mappings.push(Mapping {
            id,
            memory_start: mapping.memory_start,
            memory_limit: mapping.memory_limit,
            file_offset: mapping.file_offset,
            filename,
            build_id,
            has_functions: mapping.has_functions,
            has_filenames: mapping.has_filenames,
            has_line_numbers: mapping.has_line_numbers,
            has_inline_frames: mapping.has_inline_frames,
        });
        self.mapping_cache.insert(key, id);
        Ok(PProfId::from(id))
    }

    fn add_function(&mut self, function: &api::Function) -> PProfId {
        let name = self.intern(function.name);
        let system_name = self.intern(function.system_name);
        let filename = self.intern(function.filename);
        let start_line = if function.start_line < 0 {
            u63::new(0)
        } else {
            u63::new(function.start_line as u64)
        };
        let key = (name, system_name, filename, start_line);

        if let Some(&id) = self.function_cache.get(&key) {
            return PProfId::from(id);
        }

        let id = self.next_function_id;
        self.next_function_id += 1;
        self.functions.push(Function {
            id,
            name,
            system_name,
            filename,
            start_line,
        });
        self.function_cache.insert(key, id);
        PProfId::from(id)
    }

    fn add_location(&mut self, mapping: PProfId, address: u64, lines: Vec<Line>) -> PProfId {
        let key = (mapping, address, lines.clone());
        if let Some(&id) = self.location_cache.get(&key) {
            return PProfId::from(id);
        }

        let id = self.next_location_id;
        self.next_location_id += 1;
        self.locations.push(Location {
            id,
            mapping,
            address,
            lines,
        });
        self.location_cache.insert(key, id);
        PProfId::from(id)
    }

    /// Adds a sample, interning its strings and folding its call stack into
    /// the profile's mapping/location/function tables. A sample whose
    /// locations and labels exactly match one already present has its
    /// values added to the existing row rather than appearing twice — a
    /// convenience for incremental collection. `parse`-decoded profiles
    /// never go through this path, so on-the-wire samples are kept exactly
    /// as found, duplicates included.
    pub fn add(&mut self, sample: api::Sample) -> Result<(), Error> {
        if sample.values.len() != self.sample_types.len() {
            return Err(Error::invalid_argument(format!(
                "sample has {} values vs. {} sample types",
                sample.values.len(),
                self.sample_types.len()
            )));
        }

        let mut locations = Vec::with_capacity(sample.locations.len());
        for location in &sample.locations {
            let mapping_id = match &location.mapping {
                Some(m) => self.add_mapping(m)?,
                None => PProfId::NONE,
            };
            let lines: Vec<Line> = location
                .lines
                .iter()
                .map(|line| Line {
                    function: self.add_function(&line.function),
                    line: line.line,
                })
                .collect();
            locations.push(self.add_location(mapping_id, location.address, lines));
        }

        let labels: Vec<(PProfId, PProfId)> = sample
            .labels
            .iter()
            .map(|l| (self.intern(l.key), self.intern(l.value)))
            .collect();
        let num_labels: Vec<(PProfId, i64)> = sample
            .num_labels
            .iter()
            .map(|l| (self.intern(l.key), l.value))
            .collect();

        let key: SampleKey = (locations.clone(), labels.clone(), num_labels.clone());
        match self.sample_index.get(&key) {
            Some(&index) => {
                let existing = &mut self.samples[index];
                for (a, b) in existing.values.iter_mut().zip(sample.values.iter().copied()) {
                    *a += b;
                }
            }
            None => {
                let index = self.samples.len();
                self.samples.push(Sample {
                    locations,
                    values: sample.values,
                    labels,
                    num_labels,
                });
                self.sample_index.insert(key, index);
            }
        }
        Ok(())
    }

    fn extract_api_sample_types(&self) -> Option<Vec<api::ValueType>> {
        let mut sample_types = Vec::with_capacity(self.sample_types.len());
        for sample_type in self.sample_types.iter() {
            sample_types.push(api::ValueType {
                r#type: self.get_string(sample_type.type_)?,
                unit: self.get_string(sample_type.unit)?,
            });
        }
        Some(sample_types)
    }

    /// Resets all data except the sample types and period. Returns the
    /// previous profile on success.
    pub fn reset(&mut self) -> Option<Profile> {
        // Map over the types rather than copy the underlying structures,
        // since string interning order is not guaranteed to match.
        let sample_types = self.extract_api_sample_types()?;

        let mut profile = ProfileBuilder::new()
            .sample_types(sample_types)
            .period(match &self.period_type {
                Some(t) => Some(api::Period {
                    r#type: api::ValueType {
                        r#type: self.get_string(t.type_)?,
                        unit: self.get_string(t.unit)?,
                    },
                    value: self.period,
                }),
                None => None,
            })
            .build();

        std::mem::swap(self, &mut profile);
        Some(profile)
    }

    /// Pre-encodes and protobuf-encodes the profile, without gzip framing.
    pub fn serialize(&self) -> Result<EncodedProfile, Error> {
        let wire = linker::pre_encode(self);
        let mut buffer = Vec::new();
        wire.encode(&mut buffer)?;
        Ok(EncodedProfile {
            start: self.start_time,
            end: SystemTime::now(),
            buffer,
        })
    }

    /// Enforces every invariant in the data model: nonzero/unique ids,
    /// resolving references, and per-sample value arity.
    pub fn check_valid(&self) -> Result<(), Error> {
        validate::check_valid(self)
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads all bytes from `reader`, auto-detects gzip framing, and decodes a
/// profile. Falls back to the legacy decoders if protobuf decoding fails,
/// and always validates before returning.
pub fn parse<R: Read>(mut reader: R) -> Result<Profile, Error> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    parse_data(&bytes)
}

/// Same as [`parse`], from an in-memory byte slice.
pub fn parse_data(bytes: &[u8]) -> Result<Profile, Error> {
    let raw = maybe_gunzip(bytes)?;
    match decode_protobuf(&raw) {
        Ok(profile) => Ok(profile),
        Err(protobuf_err) => match legacy::try_decode(&raw) {
            Ok(profile) => {
                validate::check_valid(&profile)?;
                Ok(profile)
            }
            Err(Error::Unrecognized) => Err(protobuf_err),
            Err(e) => Err(e),
        },
    }
}

/// Decodes a profile without sniffing for gzip framing or falling back to
/// legacy formats.
pub fn parse_uncompressed(bytes: &[u8]) -> Result<Profile, Error> {
    decode_protobuf(bytes)
}

/// Pre-encodes, protobuf-encodes, and gzips `profile` to `writer`.
pub fn write<W: Write>(profile: &Profile, mut writer: W) -> Result<(), Error> {
    let encoded = profile.serialize()?;
    let mut gzip = GzEncoder::new(Vec::new(), Compression::default());
    gzip.write_all(&encoded.buffer)?;
    writer.write_all(&gzip.finish()?)?;
    Ok(())
}

/// Same as [`write`], without gzip framing.
pub fn write_uncompressed<W: Write>(profile: &Profile, mut writer: W) -> Result<(), Error> {
    let encoded = profile.serialize()?;
    writer.write_all(&encoded.buffer)?;
    Ok(())
}

fn maybe_gunzip(bytes: &[u8]) -> Result<Vec<u8>, Error> {
    if bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b {
        let mut decoder = GzDecoder::new(bytes);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    } else {
        Ok(bytes.to_vec())
    }
}

fn decode_protobuf(bytes: &[u8]) -> Result<Profile, Error> {
    let wire = pprof::Profile::decode(bytes)?;
    let profile = linker::post_decode(wire)?;
    validate::check_valid(&profile)?;
    Ok(profile)
}


#[cfg(test)]
mod scenario_test {
    //! End-to-end scenarios named in spec.md's TESTABLE PROPERTIES section.

    use prost::Message;

    use crate::{pprof, Error};

    #[test]
    fn minimal_empty_profile_round_trips_through_gzip() {
        let wire = pprof::Profile {
            string_table: vec!["".into(), "samples".into(), "count".into()],
            sample_type: vec![pprof::ValueType { r#type: 1, unit: 2 }],
            period: 1,
            ..Default::default()
        };
        let mut raw = Vec::new();
        wire.encode(&mut raw).unwrap();

        let mut gzipped = Vec::new();
        {
            let mut encoder = flate2::write::GzEncoder::new(&mut gzipped, flate2::Compression::default());
            std::io::Write::write_all(&mut encoder, &raw).unwrap();
            encoder.finish().unwrap();
        }

        let profile = crate::parse_data(&gzipped).expect("gzipped minimal profile to parse");
        assert!(profile.samples.is_empty());
        assert_eq!(profile.period, 1);
        profile.check_valid().expect("minimal profile to be valid");
        assert!(crate::has_functions(&profile));
        assert!(crate::has_file_lines(&profile));

        // P2: parse(write(parse(b))) == parse(b).
        let mut written = Vec::new();
        crate::write(&profile, &mut written).expect("write to succeed");
        let reparsed = crate::parse_data(&written).expect("re-parse to succeed");
        assert_eq!(reparsed.samples.len(), profile.samples.len());
        assert_eq!(reparsed.period, profile.period);
    }

    #[test]
    fn sample_value_arity_mismatch_is_reported_by_message() {
        let wire = pprof::Profile {
            string_table: vec!["".into(), "cpu".into(), "ns".into(), "samples".into(), "count".into()],
            sample_type: vec![
                pprof::ValueType { r#type: 1, unit: 2 },
                pprof::ValueType { r#type: 3, unit: 4 },
            ],
            sample: vec![pprof::Sample {
                location_id: vec![],
                value: vec![1],
                label: vec![],
            }],
            ..Default::default()
        };
        let mut raw = Vec::new();
        wire.encode(&mut raw).unwrap();

        let err = crate::parse_uncompressed(&raw).unwrap_err();
        match err {
            Error::Malformed(msg) => assert!(msg.contains("mismatch: sample has: 1 values vs. 2 types"), "{msg}"),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }
}
