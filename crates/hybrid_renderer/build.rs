// build.rs
// Compiles the renderer's GLSL sources to SPIR-V when a Vulkan SDK is available

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Shaders compiled a second time with an extra define, for materials that carry texture maps
const VARIANTS: &[(&str, &str, &str)] = &[
    ("gbuffer.frag", "MATERIAL_MAPS", "gbuffer_maps.frag.spv"),
    ("forward.frag", "MATERIAL_MAPS", "forward_maps.frag.spv"),
];

fn needs_compile(src: &Path, dst: &Path) -> bool {
    match (std::fs::metadata(src), std::fs::metadata(dst)) {
        (Ok(src_meta), Ok(dst_meta)) => match (src_meta.modified(), dst_meta.modified()) {
            (Ok(src_time), Ok(dst_time)) => src_time > dst_time,
            _ => true,
        },
        _ => true,
    }
}

fn compile(glslc: &str, shader_dir: &Path, src: &Path, dst: &Path, define: Option<&str>) {
    let mut command = Command::new(glslc);
    command.arg("-I").arg(shader_dir);
    if let Some(define) = define {
        command.arg(format!("-D{define}"));
    }
    let status = command.arg(src).arg("-o").arg(dst).status();

    match status {
        Ok(s) if s.success() => {
            eprintln!("info: Compiled {:?} -> {:?}", src.file_name(), dst.file_name());
        }
        Ok(s) => {
            eprintln!("error: glslc failed for {:?} with exit code: {}", src, s.code().unwrap_or(-1));
            panic!("Shader compilation failed");
        }
        Err(e) => {
            eprintln!("error: Failed to run glslc for {:?}: {}", src, e);
            panic!("Failed to execute shader compiler");
        }
    }
}

fn main() {
    println!("cargo:rerun-if-changed=../../resources/shaders");

    let skip_shaders =
        env::var("SKIP_SHADERS").is_ok() || env::args().any(|arg| arg == "--skip-shaders");
    if skip_shaders {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set or --skip-shaders arg)");
        return;
    }

    let vulkan_sdk = match env::var("VULKAN_SDK") {
        Ok(sdk) => sdk,
        Err(_) => {
            println!("cargo:rerun-if-env-changed=VULKAN_SDK");
            eprintln!("warning: VULKAN_SDK not set, shader compilation skipped");
            eprintln!("hint: Install Vulkan SDK and set VULKAN_SDK environment variable");
            return;
        }
    };

    let glslc = if cfg!(target_os = "windows") {
        format!("{}\\Bin\\glslc.exe", vulkan_sdk)
    } else {
        format!("{}/bin/glslc", vulkan_sdk)
    };

    if !Path::new(&glslc).exists() {
        eprintln!("error: glslc not found at: {}", glslc);
        eprintln!("hint: Ensure Vulkan SDK is properly installed");
        panic!("Shader compiler not found");
    }

    let shader_dir = PathBuf::from("../../resources/shaders");
    let target_dir = PathBuf::from("../../target/shaders");

    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        eprintln!("warning: Failed to create target directory: {}", e);
        return;
    }

    let entries = match std::fs::read_dir(&shader_dir) {
        Ok(entries) => entries,
        Err(_) => {
            eprintln!("info: No shader directory found at: {:?}", shader_dir);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(ext) = path.extension() else { continue };
        if ext != "vert" && ext != "frag" {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else { continue };

        // gbuffer.frag -> gbuffer.frag.spv
        let out_file = target_dir.join(format!("{file_name}.spv"));
        if needs_compile(&path, &out_file) {
            compile(&glslc, &shader_dir, &path, &out_file, None);
        }

        for (source, define, output) in VARIANTS {
            if *source == file_name {
                let variant_file = target_dir.join(output);
                if needs_compile(&path, &variant_file) {
                    compile(&glslc, &shader_dir, &path, &variant_file, Some(define));
                }
            }
        }
    }
}
