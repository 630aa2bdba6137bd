// Licensed under the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0>

fn main() -> Result<(), std::io::Error> {
    prost_build::compile_protos(&["src/profile.proto"], &["src"])?;
    Ok(())
}
