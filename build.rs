//! Build script for drug-interaction-api.
//!
//! llama.cpp itself is compiled by `llama-cpp-2`'s own build script. With the
//! `cuda` feature this adds the CUDA toolkit's library directories to the link
//! search path, which some container images need because `libcuda.so` is only
//! present as a stub there.

use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=CUDA_PATH");

    if std::env::var_os("CARGO_FEATURE_CUDA").is_none() {
        return;
    }

    let cuda_path = std::env::var("CUDA_PATH").unwrap_or_else(|_| "/usr/local/cuda".to_string());
    let cuda_path = PathBuf::from(cuda_path);

    for dir in ["lib64", "lib64/stubs", "targets/x86_64-linux/lib", "targets/sbsa-linux/lib"] {
        let candidate = cuda_path.join(dir);
        if candidate.is_dir() {
            println!("cargo:rustc-link-search=native={}", candidate.display());
        }
    }

    if !cuda_path.is_dir() {
        println!(
            "cargo:warning=CUDA feature enabled but {} does not exist; set CUDA_PATH",
            cuda_path.display()
        );
    }
}
