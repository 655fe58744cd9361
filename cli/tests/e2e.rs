//! Full lifecycle against a real AWS account. Needs terraform on PATH,
//! credentials in the environment and an existing key pair named by
//! `WARDEN_KEY_NAME` (default `bitwarden`).
//!
//! cargo test -p warden --test e2e -- --ignored

use std::net::IpAddr;

use assert_cmd::Command;
use predicates::str::contains;

fn warden(workdir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("warden").unwrap();
    cmd.env("WARDEN_WORKDIR", workdir);
    cmd
}

#[test]
#[ignore]
fn deploy_verify_destroy() {
    let dir = tempfile::tempdir().unwrap();
    let workdir = dir.path();

    let deployed = warden(workdir).arg("deploy").assert().success();
    let stdout = String::from_utf8_lossy(&deployed.get_output().stdout).to_string();
    let ip: IpAddr = stdout
        .lines()
        .last()
        .and_then(|l| l.trim().parse().ok())
        .expect("deploy prints the Elastic IP last");

    warden(workdir)
        .arg("output")
        .assert()
        .success()
        .stdout(format!("{}\n", ip));

    warden(workdir)
        .arg("verify")
        .assert()
        .success()
        .stdout(contains("is associated with"));

    // Re-applying an unchanged declaration must be a no-op.
    warden(workdir).arg("drift").assert().success();

    warden(workdir)
        .arg("destroy")
        .assert()
        .success()
        .stdout(contains("destroyed"));
}
