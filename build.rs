use std::env;
use std::path::PathBuf;

/// Point Windows builds at a vcpkg FFmpeg install when `FFMPEG_DIR` is
/// missing. Other targets rely on pkg-config through `ffmpeg-sys-next`.
fn main() {
    for variable in ["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_TRIPLET"] {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    if env::var("CARGO_CFG_TARGET_OS").unwrap_or_default() != "windows" || env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    let Ok(vcpkg_root) = env::var("VCPKG_ROOT") else {
        println!("cargo:warning=framepick needs FFmpeg: set FFMPEG_DIR, or VCPKG_ROOT for a vcpkg install.");
        return;
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let candidate = PathBuf::from(vcpkg_root).join("installed").join(triplet);
    if candidate.join("include").join("libavformat").exists() {
        println!(
            "cargo:warning=Found FFmpeg under {}; export FFMPEG_DIR={} to silence this message.",
            candidate.display(),
            candidate.display()
        );
    } else {
        println!("cargo:warning=No FFmpeg headers under {}.", candidate.display());
    }
}
