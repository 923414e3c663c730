use std::{env, path::PathBuf};

fn main() {
    let target = env::var("TARGET").expect("TARGET not set");

    // Only the freestanding i686 kernel target links against our script; the
    // host target (used for `cargo test` of the hosted unit tests) links
    // normally against the host's own runtime.
    if target.contains("i686") && env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("none") {
        let manifest_dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
        let linker_script = PathBuf::from(manifest_dir).join("src/arch/x86/linker.ld");
        println!("cargo:rustc-link-arg=-T{}", linker_script.display());
    }

    println!("cargo:rerun-if-changed=src/arch/x86/linker.ld");
}
