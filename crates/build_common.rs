// Shared build script helper: turns a crate's README.md into rustdoc.
// Include this in build.rs files with: include!("../build_common.rs");
//
// Required imports in the including file:
//   use std::env;
//   use std::fs;
//   use std::path::Path;

/// Copy `README.md` into `OUT_DIR/README_GENERATED.md` with links rewritten
/// for rustdoc.
///
/// Links of the form `](src/foo.rs)` become `](foo)` so that rustdoc resolves
/// them as module paths. A crate without a README gets an empty document so
/// that `include_str!` in `lib.rs` never fails.
fn process_readme_for_rustdoc(crate_dir: &str) {
    println!("cargo:rerun-if-changed=README.md");

    let readme_path = Path::new(crate_dir).join("README.md");
    let content = fs::read_to_string(&readme_path).unwrap_or_default();

    let rustdoc_content = content.replace("](src/", "](").replace(".rs)", ")");

    let out_dir = env::var("OUT_DIR").expect("cargo always sets OUT_DIR for build scripts");
    let dest_path = Path::new(&out_dir).join("README_GENERATED.md");
    fs::write(dest_path, rustdoc_content).expect("OUT_DIR is writable");
}
