// SPDX-FileCopyrightText: 2025 Contributors to the dynaudnorm-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Build script for the `dynaudnorm` crate.
//!
//! This script generates `constants.rs` containing the directory the engine
//! shared library was installed to, taken from `DYNAUDNORM_LIB_DIR` at build
//! time. The configuration module uses it as the default search location.

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=DYNAUDNORM_LIB_DIR");
    let lib_dir = env::var("DYNAUDNORM_LIB_DIR").unwrap_or_default();

    // Generate constants.rs in the build output directory
    let out_path = PathBuf::from(env::var("OUT_DIR").expect("failed to get output directory"))
        .join("constants.rs");

    let data = format!("pub const DYNAUDNORM_LIB_DIR: &str = {:?};\n", lib_dir);
    std::fs::write(out_path, data).expect("Unable to write file");
}
