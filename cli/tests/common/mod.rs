use std::{fs, path::Path, path::PathBuf};

use assert_cmd::Command;

/// `warden` with none of the caller's WARDEN_* or AWS settings leaking in.
pub fn warden(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("warden").unwrap();
    for var in [
        "WARDEN_CONFIG",
        "WARDEN_STACK",
        "WARDEN_KEY_NAME",
        "WARDEN_TERRAFORM",
        "AWS_DEFAULT_REGION",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("WARDEN_WORKDIR", workdir);
    cmd
}

/// A stand-in for terraform: a shell script answering by subcommand.
#[cfg(unix)]
pub fn fake_terraform(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("terraform");
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

pub const OUTPUTS: &str = r#"{"BitwardenElasticIP":{"sensitive":false,"type":"string","value":"54.12.34.56"},"instance_id":{"sensitive":false,"type":"string","value":"i-0abc"}}"#;
