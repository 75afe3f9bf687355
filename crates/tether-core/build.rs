//! Build script for tether-core
//!
//! Checks system requirements before compilation:
//! - Minimum Rust version (`std::mem::offset_of!` needs 1.77.0)
//! - That the build target is one of the supported tracing backends
//!
//! ## Requirements
//!
//! - **Rust**: 1.77.0 or newer
//! - **Linux**: any kernel with `PTRACE_GETREGSET` (2.6.33+)
//! - **OpenBSD**: ptrace-capable kernel (always true)

fn main()
{
    // offset_of! is used for the debug-register slots in the user area
    if let Ok(rustc_version) = rustc_version::version() {
        let min_rust_version = rustc_version::Version::parse("1.77.0").unwrap();

        if rustc_version < min_rust_version {
            panic!(
                "tether-core requires Rust {} or newer, found {}",
                min_rust_version, rustc_version
            );
        }
    } else {
        // If we can't get version (e.g., in some build environments), just warn
        println!("cargo:warning=could not verify Rust version");
    }

    #[cfg(not(any(target_os = "linux", target_os = "openbsd")))]
    println!("cargo:warning=no process-control backend for this target; only host-independent types will be usable");
}
