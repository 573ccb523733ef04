//! Build script for compile-time configuration injection.
//!
//! Set environment variables before building to configure the firmware:
//!
//!   PROBE_TUNNEL=D6E1A \
//!   PROBE_AES_KEY=000102030405060708090a0b0c0d0e0f \
//!   PROBE_AES_IV=f0e0d0c0b0a090807060504030201000 \
//!   cargo build --release --features esp32
//!
//! Key and IV are 32 hex characters (128 bits). Malformed values fall back
//! to the built-in defaults, which the firmware reports at boot.

fn main() {
    // Re-run build script if these environment variables change
    println!("cargo::rerun-if-env-changed=PROBE_TUNNEL");
    println!("cargo::rerun-if-env-changed=PROBE_AES_KEY");
    println!("cargo::rerun-if-env-changed=PROBE_AES_IV");
}
