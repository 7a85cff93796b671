mod support_http;

use tempfile::tempdir;

use support_http::{run_tickhttp, spawn_http_server_or_skip};

#[test]
fn e2e_cli_fetches_urls() -> Result<(), String> {
    let Some((url, _server)) = spawn_http_server_or_skip()? else {
        return Ok(());
    };
    let output = run_tickhttp([
        format!("{}/", url),
        format!("{}/json", url),
        "--workers".to_owned(),
        "1".to_owned(),
        "--tick-ms".to_owned(),
        "5ms".to_owned(),
    ])?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !output.status.success() {
        return Err(format!(
            "stdout: {}\nstderr: {}",
            stdout,
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    let lines: Vec<&str> = stdout.lines().collect();
    if lines.len() != 2 || !lines.iter().all(|line| line.starts_with("done 200 GET")) {
        return Err(format!("unexpected summary:\n{}", stdout));
    }
    Ok(())
}

#[test]
fn e2e_cli_exits_non_zero_on_failure() -> Result<(), String> {
    let Some((url, _server)) = spawn_http_server_or_skip()? else {
        return Ok(());
    };
    let output = run_tickhttp([format!("{}/missing", url)])?;
    if output.status.success() {
        return Err("a 404 must fail the run".to_owned());
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.starts_with("error 404 GET") {
        return Err(format!("unexpected summary:\n{}", stdout));
    }
    Ok(())
}

#[test]
fn e2e_cli_downloads_into_directory() -> Result<(), String> {
    let Some((url, _server)) = spawn_http_server_or_skip()? else {
        return Ok(());
    };
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let out = dir.path().join("out");
    let output = run_tickhttp([
        format!("{}/file.txt", url),
        "--download-dir".to_owned(),
        out.to_string_lossy().into_owned(),
    ])?;
    if !output.status.success() {
        return Err(format!(
            "stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    let content = std::fs::read_to_string(out.join("file.txt"))
        .map_err(|err| format!("read failed: {}", err))?;
    if content != "file contents\n" {
        return Err(format!("unexpected content {:?}", content));
    }
    Ok(())
}

#[test]
fn e2e_cli_requires_url() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let config = dir.path().join("empty.toml");
    std::fs::write(&config, "workers = 1\n").map_err(|err| format!("write failed: {}", err))?;
    let output = run_tickhttp(["--config".to_owned(), config.to_string_lossy().into_owned()])?;
    if output.status.success() {
        return Err("missing URL must fail".to_owned());
    }
    Ok(())
}
