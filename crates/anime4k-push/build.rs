//! Build script for anime4k-push crate
//!
//! Embeds the WGSL kernels of the push pipeline into the compiled binary.
//! Each shader is parsed, validated and minified with naga so that syntax errors
//! surface at build time; if minification fails the original source is embedded
//! and a cargo warning is emitted.

use std::fmt::Write as _;

/// Shader files and the constant names they are exported as
const SHADERS: &[(&str, &str)] = &[
    ("scale.wgsl", "SCALE_WGSL"),
    ("luminance.wgsl", "LUMINANCE_WGSL"),
    ("push.wgsl", "PUSH_WGSL"),
    ("gradient.wgsl", "GRADIENT_WGSL"),
    ("final.wgsl", "FINAL_WGSL"),
];

/// Minifies WGSL shader source code to reduce binary size
///
/// Uses naga to parse, validate, and regenerate the WGSL code in a more compact form.
fn minify_wgsl(shader: &str) -> Result<String, Box<dyn std::error::Error>> {
    let mut module = naga::front::wgsl::parse_str(shader)?;

    wgsl_minifier::minify_module(&mut module);

    let mut validator = naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all());
    let info = validator.validate(&module)?;
    let output = naga::back::wgsl::write_string(&module, &info, naga::back::wgsl::WriterFlags::empty())?;

    Ok(wgsl_minifier::minify_wgsl_source(&output))
}

/// Converts WGSL shader source into a Rust string literal
fn dump_shader_string_literal(shader: &str) -> String {
    let escaped_shader = shader.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n");
    format!("\"{escaped_shader}\"")
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=shaders");

    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set by cargo");
    let out_dir = std::env::var("OUT_DIR").expect("OUT_DIR is set by cargo");

    let mut output = String::new();
    output.push_str("// Generated by build.rs. Do not edit.\n\n");

    for (file, constant) in SHADERS {
        let path = std::path::Path::new(&manifest_dir).join("shaders").join(file);
        let source = std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read shader {}: {e}", path.display()));

        let shader = match minify_wgsl(&source) {
            Ok(minified) => minified,
            Err(e) => {
                println!("cargo:warning=Embedding unminified {file}: {e}");
                source
            }
        };

        writeln!(output, "pub const {constant}: &str = {};", dump_shader_string_literal(&shader)).expect("writing to a String cannot fail");
    }

    let dest = std::path::Path::new(&out_dir).join("shaders.rs");
    std::fs::write(&dest, output).unwrap_or_else(|e| panic!("Failed to write {}: {e}", dest.display()));
}
