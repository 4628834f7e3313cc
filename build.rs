use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=FFMPEG_DIR");
    println!("cargo:rerun-if-env-changed=VCPKG_ROOT");

    // Only the `ffmpeg` feature links against system libraries.
    if env::var_os("CARGO_FEATURE_FFMPEG").is_none() {
        return;
    }
    if env::var("CARGO_CFG_TARGET_OS").unwrap_or_default() != "windows" {
        return;
    }
    if env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    let Ok(vcpkg_root) = env::var("VCPKG_ROOT") else {
        println!(
            "cargo:warning=The ffmpeg feature needs FFmpeg development libraries. Set FFMPEG_DIR or VCPKG_ROOT."
        );
        return;
    };

    let ffmpeg_dir = PathBuf::from(vcpkg_root).join("installed").join("x64-windows");
    if ffmpeg_dir.exists() {
        println!(
            "cargo:warning=Found vcpkg FFmpeg at {}. Set FFMPEG_DIR to that path to silence this warning.",
            ffmpeg_dir.display()
        );
    } else {
        println!("cargo:warning=No vcpkg FFmpeg install at {}.", ffmpeg_dir.display());
    }
}
