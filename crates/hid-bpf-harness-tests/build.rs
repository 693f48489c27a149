// Builds the fixture quirk modules used by the integration tests.
//
// Each `modules/<name>.c` is linked with the test wrapper into
// `$OUT_DIR/modules/libtest-<name>.so`, and `<name>.json` (if present) is
// copied next to it as the companion program metadata.

use std::env;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

const MODULE_SOURCE_DIR: &str = "modules";
const WRAPPER: &str = "test-wrapper.c";
const ARTIFACT_PREFIX: &str = "libtest-";

/// Modules deliberately built without the test wrapper.
const STANDALONE_MODULES: &[&str] = &["0010-missing-callbacks"];

fn build_module(
    source: &Path,
    wrapper: Option<&Path>,
    output: &Path,
    target_os: &str,
) -> Result<(), Box<dyn Error>> {
    let compiler = cc::Build::new()
        .include(MODULE_SOURCE_DIR)
        .warnings(true)
        .try_get_compiler()?;

    let mut cmd = compiler.to_command();
    if target_os == "macos" {
        cmd.arg("-dynamiclib");
    } else {
        cmd.arg("-shared");
    }
    cmd.arg("-fPIC")
        .arg(format!("-I{MODULE_SOURCE_DIR}"))
        .arg("-o")
        .arg(output)
        .arg(source);
    if let Some(wrapper) = wrapper {
        cmd.arg(wrapper);
    }

    let status = cmd.status()?;
    if !status.success() {
        return Err(format!("failed to build test module {}", source.display()).into());
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo:rerun-if-changed={MODULE_SOURCE_DIR}");

    if env::var_os("CARGO_CFG_UNIX").is_none() {
        println!("cargo:warning=test modules are only built on unix targets");
        return Ok(());
    }

    let target_os = env::var("CARGO_CFG_TARGET_OS")?;
    let suffix = if target_os == "macos" { ".dylib" } else { ".so" };

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let dst_dir = out_dir.join("modules");
    fs::create_dir_all(&dst_dir)?;

    let src_dir = Path::new(MODULE_SOURCE_DIR);
    let wrapper = src_dir.join(WRAPPER);

    for entry in fs::read_dir(src_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("c") || path == wrapper {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let linked_wrapper = (!STANDALONE_MODULES.contains(&stem)).then_some(wrapper.as_path());
        let artifact = dst_dir.join(format!("{ARTIFACT_PREFIX}{stem}{suffix}"));
        build_module(&path, linked_wrapper, &artifact, &target_os)?;

        let metadata = path.with_extension("json");
        if metadata.is_file() {
            fs::copy(&metadata, dst_dir.join(format!("{ARTIFACT_PREFIX}{stem}.json")))?;
        }
    }

    Ok(())
}
