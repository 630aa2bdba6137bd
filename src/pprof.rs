// Licensed under the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0>

// This lint complains if we implement Hash by hand but derive PartialEq. This
// is a good lint because these two things must agree.
// However, we cannot control the prost-generated code, so cannot remove
// PartialEq or alternatively derive Hash, so we allow this lint.
#![allow(clippy::derive_hash_xor_eq)]

use std::hash::{Hash, Hasher};

include!(concat!(env!("OUT_DIR"), "/pprof.rs"));

impl Copy for ValueType {}
impl Eq for ValueType {}

impl Hash for ValueType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.r#type.hash(state);
        self.unit.hash(state);
    }
}

impl Copy for Label {}
impl Eq for Label {}

impl Hash for Label {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.str.hash(state);
        self.num.hash(state);
    }
}

impl Copy for Line {}
impl Eq for Line {}

impl Hash for Line {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.function_id.hash(state);
        self.line.hash(state);
    }
}

impl Copy for Mapping {}
impl Eq for Mapping {}

impl Hash for Mapping {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.memory_start.hash(state);
        self.memory_limit.hash(state);
        self.file_offset.hash(state);
        self.filename.hash(state);
        self.build_id.hash(state);
        self.has_functions.hash(state);
        self.has_filenames.hash(state);
        self.has_line_numbers.hash(state);
        self.has_inline_frames.hash(state);
    }
}

impl Copy for Function {}
impl Eq for Function {}

impl Hash for Function {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.name.hash(state);
        self.system_name.hash(state);
        self.filename.hash(state);
        self.start_line.hash(state);
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.mapping_id.hash(state);
        self.address.hash(state);
        self.line.hash(state);
    }
}
