//! Exit behaviour of the `hookrelay` binary for bad input.

use std::process::{Command, Output};

use anyhow::Result;

fn hookrelay(args: &[&str]) -> Result<Output> {
    Ok(Command::new(env!("CARGO_BIN_EXE_hookrelay")).args(args).output()?)
}

#[test]
fn argument_error_prints_help_then_error_and_exits_2() -> Result<()> {
    let output = hookrelay(&["forward", "https://smee.io/abc"])?;

    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8(output.stdout)?;
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stdout.contains("Usage: hookrelay"));
    assert!(stdout.contains("Examples:"));
    assert!(stderr.contains("error:"));
    assert!(stderr.contains("<TARGET>"));
    Ok(())
}

#[test]
fn help_exits_0() -> Result<()> {
    let output = hookrelay(&["--help"])?;

    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8(output.stdout)?.contains("Usage: hookrelay"));
    Ok(())
}

#[test]
fn invalid_config_file_exits_2() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("hookrelay.toml");
    std::fs::write(&config, "workers = 0\n")?;
    let config = config.to_string_lossy();

    let output =
        hookrelay(&["--config", &config, "send", "http://127.0.0.1:9/hook", "saved.txt"])?;

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("error:"));
    assert!(stderr.contains("workers must be greater than 0"));
    Ok(())
}

#[test]
fn missing_config_file_exits_2() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let missing = dir.path().join("missing.toml");
    let missing = missing.to_string_lossy();

    let output = hookrelay(&["--config", &missing, "show", "https://smee.io/abc"])?;

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8(output.stderr)?.contains("not found"));
    Ok(())
}
