// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tests for the `cloud-vbmc` executable.  Request handling is tested
//! elsewhere; these check that startup failures stop the process before it
//! serves anything, with the right exit status and a diagnostic.

use camino::Utf8Path;
use camino::Utf8PathBuf;
use camino_tempfile::Utf8TempDir;
use std::fs;
use std::time::Duration;
use subprocess::Exec;
use subprocess::ExitStatus;
use subprocess::NullFile;
use subprocess::Redirection;

/// name of the "cloud-vbmc" executable
const CMD_CLOUD_VBMC: &str = env!("CARGO_BIN_EXE_cloud-vbmc");

/// maximum time to wait for any command
///
/// A bug that lets the server start would otherwise hang the test forever.
const TIMEOUT: Duration = Duration::from_secs(10);

const EXIT_FAILURE: u32 = 1;
const EXIT_USAGE: u32 = 2;

const TWO_FOOS: &str = r#"
[log]
level = "info"
mode = "stderr-terminal"

[auth_data]
admin = "password"

[clouds.sim]
type = "simulated"

[[clouds.sim.servers]]
id = "abc-123"
name = "foo"
status = "SHUTOFF"

[[clouds.sim.servers]]
id = "def-456"
name = "foo"
status = "ACTIVE"
"#;

/// Run the given command to completion or up to [`TIMEOUT`], whichever is
/// shorter, returning its exit status, stdout and stderr.
fn run_command(exec: Exec, dir: &Utf8Path) -> (ExitStatus, String, String) {
    let cmdline = exec.to_cmdline_lossy();
    let stdout_path = dir.join("stdout");
    let stderr_path = dir.join("stderr");
    let stdout_file = fs::File::create(&stdout_path).unwrap();
    let stderr_file = fs::File::create(&stderr_path).unwrap();

    let mut subproc = exec
        .stdin(NullFile)
        .stdout(Redirection::File(stdout_file))
        .stderr(Redirection::File(stderr_file))
        .detached()
        .popen()
        .unwrap_or_else(|e| panic!("failed to start {cmdline}: {e}"));

    let exit_status = subproc
        .wait_timeout(TIMEOUT)
        .unwrap_or_else(|e| panic!("failed to wait for {cmdline}: {e}"))
        .unwrap_or_else(|| {
            let _ = subproc.kill();
            panic!("timed out waiting for {cmdline}")
        });

    let stdout_text = fs::read_to_string(&stdout_path).unwrap();
    let stderr_text = fs::read_to_string(&stderr_path).unwrap();
    (exit_status, stdout_text, stderr_text)
}

fn assert_exit_code(exit_status: ExitStatus, code: u32, stderr_text: &str) {
    assert_eq!(
        exit_status,
        ExitStatus::Exited(code),
        "unexpected exit status; stderr:\n{stderr_text}"
    );
}

fn write_config(dir: &Utf8Path, contents: &str) -> Utf8PathBuf {
    let path = dir.join("config.toml");
    fs::write(&path, contents).unwrap();
    path
}

/// Run the BMC for `instance` against a config with the given contents.
fn run_vbmc(contents: &str, instance: &str) -> (ExitStatus, String, String) {
    let dir = Utf8TempDir::new().unwrap();
    let config_path = write_config(dir.path(), contents);
    let exec = Exec::cmd(CMD_CLOUD_VBMC)
        .arg(config_path.as_str())
        .args(&["--address", "127.0.0.1", "--port", "0"])
        .args(&["--instance", instance])
        .env_remove("OS_CLOUD");
    run_command(exec, dir.path())
}

#[test]
fn test_no_args() {
    let dir = Utf8TempDir::new().unwrap();
    let exec = Exec::cmd(CMD_CLOUD_VBMC);
    let (exit_status, _, stderr_text) = run_command(exec, dir.path());
    assert_exit_code(exit_status, EXIT_USAGE, &stderr_text);
    assert!(stderr_text.contains("CONFIG_FILE_PATH"), "{stderr_text}");
}

#[test]
fn test_ambiguous_instance_name() {
    let (exit_status, _, stderr_text) = run_vbmc(TWO_FOOS, "foo");
    assert_exit_code(exit_status, EXIT_FAILURE, &stderr_text);
    assert!(
        stderr_text
            .contains("2 instances are named \"foo\"; refusing to guess"),
        "{stderr_text}"
    );
}

#[test]
fn test_absent_instance() {
    let (exit_status, _, stderr_text) = run_vbmc(TWO_FOOS, "nope");
    assert_exit_code(exit_status, EXIT_FAILURE, &stderr_text);
    assert!(
        stderr_text.contains("no instance found with id or name \"nope\""),
        "{stderr_text}"
    );
}

#[test]
fn test_empty_credential() {
    let contents = TWO_FOOS.replace("admin = \"password\"", "admin = \"\"");
    let (exit_status, _, stderr_text) = run_vbmc(&contents, "abc-123");
    assert_exit_code(exit_status, EXIT_FAILURE, &stderr_text);
    assert!(
        stderr_text.contains("BMC credential for user \"admin\" is incomplete"),
        "{stderr_text}"
    );
}
