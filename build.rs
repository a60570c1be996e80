//! Records the version of the harness from Git and the build environment so
//! that reports can be traced back to the exact build that produced them.

use std::path::Path;
use std::{env, fs};

fn generate_file(filename: &str, contents: &str) {
    let out_dir = env::var_os("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join(filename);
    fs::write(dest_path, contents).unwrap();
}

fn generate_build_info() {
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    generate_file("profile", &profile);
}

fn main() -> shadow_rs::SdResult<()> {
    generate_build_info();
    shadow_rs::new()
}
