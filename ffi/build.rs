//! Generate `lightfeed.h` from the `extern "C"` surface into `OUT_DIR`.
//!
//! The path is exported to the crate as `LIGHTFEED_HEADER` so hosts and
//! tests can locate it without guessing the build directory.

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=src/types.rs");

    let crate_dir = env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let Ok(out_dir) = env::var("OUT_DIR") else {
        println!("cargo:warning=OUT_DIR is not set; C header not generated");
        return;
    };
    let out = PathBuf::from(out_dir).join("lightfeed.h");
    println!("cargo:rustc-env=LIGHTFEED_HEADER={}", out.display());

    let result = cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("LIGHTFEED_H")
        .generate();

    match result {
        Ok(bindings) => {
            bindings.write_to_file(&out);
        }
        Err(e) => println!("cargo:warning=failed to generate C header: {e}"),
    }
}
