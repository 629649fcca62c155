use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

fn manhtml_bin() -> PathBuf {
    if let Some(path) = option_env!("CARGO_BIN_EXE_manhtml") {
        return PathBuf::from(path);
    }
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("target");
    path.push("debug");
    if cfg!(windows) {
        path.push("manhtml.exe");
    } else {
        path.push("manhtml");
    }
    path
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[test]
fn cli_converts_files_into_one_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("out.html");

    let status = Command::new(manhtml_bin())
        .arg("--chapter")
        .arg("User Commands")
        .arg("-o")
        .arg(&output)
        .arg(fixture("pages/ls.1"))
        .arg(fixture("pages/dir.1"))
        .status()
        .expect("run manhtml");

    assert!(status.success());
    let html = fs::read_to_string(output).expect("read output");
    assert_eq!(html.matches("<!DOCTYPE html>").count(), 1);
    assert!(html.contains("    <h1 id=\"user-commands\">User Commands</h1>\n"));
    assert!(html.contains("    <h2 id=\"ls.1\">ls(1)</h2>\n"));
    assert!(html.contains("    <h2 id=\"dir.1\">dir(1)</h2>\n"));
    assert!(html.ends_with("  </body>\n</html>\n"));
}

#[test]
fn cli_stdin_input_writes_stdout() {
    let mut child = Command::new(manhtml_bin())
        .args(["--title", "Piped", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn manhtml");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        stdin
            .write_all(b".TH piped 7\n.SH NAME\npiped \\- from stdin\n")
            .expect("write stdin");
    }

    let output = child.wait_with_output().expect("wait");
    assert!(output.status.success());
    let html = String::from_utf8(output.stdout).expect("utf-8 stdout");
    assert!(html.contains("    <title>Piped</title>\n"));
    assert!(html.contains("    <h2 id=\"piped.7.name\">Name</h2>\n"));
}

#[test]
fn cli_config_file_supplies_metadata() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("out.html");

    let status = Command::new(manhtml_bin())
        .arg("-c")
        .arg(fixture("metadata.yml"))
        .arg("--author")
        .arg("Override Author")
        .arg("-o")
        .arg(&output)
        .arg(fixture("pages/dir.1"))
        .status()
        .expect("run manhtml");

    assert!(status.success());
    let html = fs::read_to_string(output).expect("read output");
    assert!(html.contains("    <meta name=\"author\" content=\"Override Author\">\n"));
    assert!(html.contains("    <title>Core Utilities Manual</title>\n"));
}

#[test]
fn cli_reports_warnings_on_stderr() {
    let dir = tempfile::tempdir().expect("tempdir");
    let page = dir.path().join("warn.1");
    fs::write(&page, ".TH warn 1\n.RE\n").expect("write page");

    let output = Command::new(manhtml_bin())
        .arg("-o")
        .arg(dir.path().join("out.html"))
        .arg(&page)
        .env_remove("RUST_LOG")
        .output()
        .expect("run manhtml");

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unbalanced '.RE'"), "stderr: {stderr}");
}

#[test]
fn cli_fails_without_a_topic() {
    let dir = tempfile::tempdir().expect("tempdir");
    let page = dir.path().join("empty.1");
    fs::write(&page, "no topic here\n").expect("write page");

    let output = Command::new(manhtml_bin())
        .arg("-o")
        .arg(dir.path().join("out.html"))
        .arg(&page)
        .output()
        .expect("run manhtml");

    assert!(!output.status.success());
}

#[test]
fn cli_fails_on_missing_input() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = Command::new(manhtml_bin())
        .arg("-o")
        .arg(dir.path().join("out.html"))
        .arg(dir.path().join("missing.1"))
        .output()
        .expect("run manhtml");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing.1"), "stderr: {stderr}");
}
