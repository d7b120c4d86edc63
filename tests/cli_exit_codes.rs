use std::io::Write;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

fn h2p(dir: &TempDir, args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_h2p"))
        .args(args)
        .current_dir(dir.path())
        .env("RUST_LOG", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("run h2p");
    // h2p may exit before reading its input.
    if let Err(err) = child.stdin.take().expect("stdin").write_all(stdin.as_bytes()) {
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe, "write stdin: {err}");
    }
    child.wait_with_output().expect("wait for h2p")
}

fn write_page(dir: &TempDir) -> String {
    let page = dir.path().join("index.html");
    std::fs::write(&page, "<html><body><h1>Hello</h1></body></html>").expect("write page");
    page.to_str().unwrap().to_string()
}

#[test]
fn help_exits_zero() {
    let dir = TempDir::new().expect("tempdir");
    let out = h2p(&dir, &["--help"], "");

    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("--no-header-footer"));
    assert!(stdout.contains("--locator"));
}

#[test]
fn missing_arguments_exit_with_usage_code() {
    let dir = TempDir::new().expect("tempdir");
    let out = h2p(&dir, &["only-one-arg.html"], "");

    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn missing_input_file_exits_with_usage_code() {
    let dir = TempDir::new().expect("tempdir");
    let out = h2p(&dir, &["-f", "does-not-exist.html", "out.pdf"], "");

    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains("File 'does-not-exist.html' not found"),
        "stderr: {stderr}"
    );
    assert!(!dir.path().join("out.pdf").exists());
}

#[test]
fn unknown_locator_kind_exits_with_usage_code() {
    let dir = TempDir::new().expect("tempdir");
    let page = write_page(&dir);
    let out = h2p(&dir, &["-l", "Label=price", &page, "out"], "");

    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Unknown locator-type 'Label'"), "stderr: {stderr}");
}

#[test]
fn invalid_page_setting_exits_with_usage_code() {
    let dir = TempDir::new().expect("tempdir");
    let page = write_page(&dir);
    let out = h2p(&dir, &["-p", "sc=7", &page, "out"], "");

    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Scale must be between"), "stderr: {stderr}");
}

#[test]
fn invalid_config_file_exits_with_usage_code() {
    let dir = TempDir::new().expect("tempdir");
    let page = write_page(&dir);
    let cfg = dir.path().join("h2p.toml");
    std::fs::write(&cfg, "[page]\nscale = \"big\"\n").expect("write config");

    let out = h2p(
        &dir,
        &["--config", cfg.to_str().unwrap(), &page, "out"],
        "",
    );
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Invalid config"), "stderr: {stderr}");
}

#[test]
fn declined_overwrite_exits_zero_and_keeps_file() {
    let dir = TempDir::new().expect("tempdir");
    let page = write_page(&dir);
    let existing = dir.path().join("report.pdf");
    std::fs::write(&existing, b"previous").expect("write existing pdf");

    // ".pdf" is appended, so "report" targets the existing file.
    let out = h2p(&dir, &[&page, "report"], "n\n");

    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("overwrite report.pdf"), "stdout: {stdout}");
    assert!(stdout.contains("Operation aborted."));
    assert_eq!(std::fs::read(&existing).unwrap(), b"previous");
}

#[test]
fn empty_answer_declines_overwrite() {
    let dir = TempDir::new().expect("tempdir");
    let page = write_page(&dir);
    std::fs::write(dir.path().join("out.pdf"), b"previous").expect("write existing pdf");

    let out = h2p(&dir, &[&page, "out.pdf"], "");
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(std::fs::read(dir.path().join("out.pdf")).unwrap(), b"previous");
}

#[test]
fn stdin_input_refuses_to_prompt_over_existing_output() {
    let dir = TempDir::new().expect("tempdir");
    let existing = dir.path().join("out.pdf");
    std::fs::write(&existing, b"old").expect("write existing");

    let out = h2p(&dir, &["-", "out.pdf"], "<h1>Hello</h1>\ny\n");

    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("pass -f"), "stderr: {stderr}");
    assert!(!String::from_utf8_lossy(&out.stdout).contains("overwrite"));
    assert_eq!(std::fs::read(&existing).expect("read existing"), b"old");
}
