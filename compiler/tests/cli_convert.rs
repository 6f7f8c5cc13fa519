// End-to-end tests for the `flowc` binary: stdin input, output forms and
// exit codes.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .to_path_buf()
}

fn run(args: &[&str], stdin: &str) -> Output {
    let templates = project_root().join("templates");
    let mut child = Command::new(env!("CARGO_BIN_EXE_flowc"))
        .args(args)
        .arg("--templates")
        .arg(&templates)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .env_remove("RUST_LOG")
        .spawn()
        .expect("failed to spawn flowc");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

const SOURCE: &str = "load = LoadImage(image=\"cat.png\")\n\
                      scale = ImageScaleBy(scale_by=2.0)\n\
                      pixels, mask = load()\n\
                      big = scale(image=pixels)\n";

#[test]
fn converts_stdin_to_markdown() {
    let out = run(&["-", "--from", "sequential", "--emit", "markdown"], SOURCE);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let text = String::from_utf8(out.stdout).unwrap();
    assert!(text.starts_with("- Nodes:\n    - N1:\n"), "{text}");
    assert!(text.contains("        - image: \"cat.png\"\n"), "{text}");
    assert!(text.contains("    - L1: N1.image -> N2.image\n"), "{text}");
}

#[test]
fn workflow_json_is_the_default_form() {
    let out = run(&["-", "--from", "sequential"], SOURCE);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(value["nodes"].as_array().map(Vec::len), Some(2));
    assert!(value["extra"]["flowc"]["source_hash"].is_string());
}

#[test]
fn type_mismatch_exits_with_diagnostic() {
    let src = "load = LoadImage()\nsampler = KSampler()\n\
               pixels, mask = load()\nout = sampler(model=pixels)\n";
    let out = run(&["-", "--from", "sequential", "--emit", "staged"], src);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("error[E0200]"), "{stderr}");
    assert!(stderr.contains("line 4"), "{stderr}");
    assert!(out.stdout.is_empty());
}

#[test]
fn missing_source_file_exits_with_io_error() {
    let out = run(&["does/not/exist.flow"], "");
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("does/not/exist.flow"));
}
