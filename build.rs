//! Build script for accel-probe.
//!
//! Surfaces feature combinations that compile but can never enable the
//! capabilities they name.

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let cuda = std::env::var_os("CARGO_FEATURE_CUDA").is_some();
    let flash_attn = std::env::var_os("CARGO_FEATURE_FLASH_ATTN").is_some();

    if cuda {
        println!("cargo:warning=CUDA feature enabled — ensure the CUDA driver is installed at runtime");
    }

    if flash_attn && !cuda {
        println!(
            "cargo:warning=flash-attn enabled without cuda: flash attention will always report unavailable"
        );
    }
}
