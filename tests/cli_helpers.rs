#![allow(dead_code)]

use anyhow::{bail, Result};
use assert_cmd::cargo;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const TAXPAYER_ARGS: &[&str] = &[
    "--id",
    "12345678",
    "--fullname",
    "Ana Novak",
    "--address",
    "Slovenska cesta 1",
    "--zip",
    "1000",
    "--city",
    "Ljubljana",
    "--dob",
    "1990-01-31",
    "--tel",
    "041000000",
    "--email",
    "ana@example.com",
];

/// Copy a fixture into the scratch directory so outputs land next to it
pub fn stage_fixture(home: &TempDir, name: &str) -> PathBuf {
    let target = home.path().join(name);
    std::fs::copy(Path::new("tests/fixtures").join(name), &target)
        .expect("failed to copy fixture");
    target
}

pub fn rates_fixture() -> PathBuf {
    PathBuf::from("tests/fixtures/rates.xml")
}

/// Command with an isolated cache and the fixture rate list
pub fn base_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("kdvp"));
    cmd.env("HOME", home.path());
    cmd.env("XDG_CACHE_HOME", home.path().join(".cache"));
    cmd.env_remove("RUST_LOG");
    cmd.arg("--no-color");
    cmd.arg("--rates-cache").arg(rates_fixture());
    cmd.args(TAXPAYER_ARGS);
    cmd
}

pub fn run_cmd(home: &TempDir, args: &[&str]) -> Result<Output> {
    let mut cmd = base_cmd(home);
    cmd.args(args);
    let output = cmd.output()?;
    if !output.status.success() {
        bail!(
            "command failed: {:?}\nstdout: {}\nstderr: {}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(output)
}

/// Run a filing for `input` and return the written XML
pub fn file_xml(home: &TempDir, input: &Path, extra: &[&str]) -> Result<String> {
    let input_arg = input.to_string_lossy().into_owned();
    let mut args = vec!["--input", input_arg.as_str()];
    args.extend_from_slice(extra);
    run_cmd(home, &args)?;
    Ok(std::fs::read_to_string(input.with_extension("xml"))?)
}
