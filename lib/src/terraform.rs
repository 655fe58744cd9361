use std::{
    collections::BTreeMap,
    ffi::OsStr,
    fs::remove_dir_all,
    net::IpAddr,
    path::PathBuf,
    process::Command,
};

use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::{check_cmd, config::Config, describe, error::Error, handle_command_error, stack::Stack, synth};

/// Result of `terraform plan -detailed-exitcode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drift {
    None,
    Changes,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TerraformOutput {
    #[serde(default)]
    pub sensitive: bool,
    #[serde(rename = "type")]
    pub kind: Value,
    pub value: Value,
}

pub type TerraformOutputs = BTreeMap<String, TerraformOutput>;

fn command(config: &Config) -> Command {
    let mut cmd = Command::new(&config.terraform);
    cmd.current_dir(&config.workdir);
    cmd
}

/// Synthesize the stack into the working directory and make sure terraform
/// has been initialized there.
pub fn prepare(config: &Config, stack: &Stack) -> Result<PathBuf, Error> {
    info!("prepare terraform");
    let document = synth::synth(stack)?;
    let path = synth::write(&document, &config.workdir)?;
    if config.workdir.join(".terraform").is_dir() {
        debug!("{} already initialized", config.workdir.display());
    } else {
        check_cmd(&mut init_command(config, false))?;
    }
    Ok(path)
}

pub fn init_command(config: &Config, upgrade: bool) -> Command {
    let mut cmd = command(config);
    cmd.args(&["init", "-input=false"]);
    if upgrade {
        cmd.arg("-upgrade");
    }
    cmd
}

/// Drop the `.terraform` state dir and initialize from scratch.
pub fn init(config: &Config, upgrade: bool) -> Result<(), Error> {
    let dot_terraform = config.workdir.join(".terraform");
    if let Err(e) = remove_dir_all(&dot_terraform) {
        debug!("not removing {}: {}", dot_terraform.display(), e);
    }
    check_cmd(&mut init_command(config, upgrade))
}

pub fn plan_command(config: &Config, destroy: bool) -> Command {
    let mut cmd = command(config);
    cmd.args(&["plan", "-input=false", "-out"]).arg(config.plan_file());
    if destroy {
        cmd.arg("-destroy");
    }
    cmd
}

pub fn plan(config: &Config, destroy: bool) -> Result<(), Error> {
    info!("Plan file: {:?}", config.plan_file());
    check_cmd(&mut plan_command(config, destroy))
}

pub fn apply_command(config: &Config) -> Command {
    let mut cmd = command(config);
    cmd.args(&["apply", "-input=false"]).arg(config.plan_file());
    cmd
}

pub fn apply(config: &Config) -> Result<(), Error> {
    info!("Plan file: {:?}", config.plan_file());
    check_cmd(&mut apply_command(config))
}

pub fn destroy_command(config: &Config) -> Command {
    let mut cmd = command(config);
    cmd.args(&["destroy", "-input=false", "-auto-approve"]);
    cmd
}

pub fn destroy(config: &Config) -> Result<(), Error> {
    check_cmd(&mut destroy_command(config))
}

pub fn drift_command(config: &Config) -> Command {
    let mut cmd = command(config);
    cmd.args(&["plan", "-input=false", "-detailed-exitcode"]);
    cmd
}

/// Ask terraform whether applying the declaration again would change
/// anything.
pub fn drift(config: &Config) -> Result<Drift, Error> {
    let mut cmd = drift_command(config);
    info!("run: {:?}", cmd);
    let status = cmd.status()?;
    drift_from_code(&cmd, status.code())
}

fn drift_from_code(cmd: &Command, code: Option<i32>) -> Result<Drift, Error> {
    match code {
        Some(0) => Ok(Drift::None),
        Some(2) => Ok(Drift::Changes),
        Some(code) => Err(Error::UnexpectedStatus {
            command: describe(cmd),
            code,
        }),
        None => Err(Error::Interrupted(describe(cmd))),
    }
}

pub fn output_command(config: &Config) -> Command {
    let mut cmd = command(config);
    cmd.args(&["output", "-json"]);
    cmd
}

pub fn output(config: &Config) -> Result<TerraformOutputs, Error> {
    let out = handle_command_error(output_command(config))?;
    parse_outputs(&out.stdout)
}

pub fn parse_outputs(raw: &[u8]) -> Result<TerraformOutputs, Error> {
    Ok(serde_json::from_slice(raw)?)
}

pub fn output_str<'a>(outputs: &'a TerraformOutputs, name: &str) -> Result<&'a str, Error> {
    outputs
        .get(name)
        .and_then(|o| o.value.as_str())
        .ok_or_else(|| Error::MissingOutput(name.to_string()))
}

/// The exported static address.
pub fn elastic_ip(outputs: &TerraformOutputs, export_name: &str) -> Result<IpAddr, Error> {
    let raw = output_str(outputs, export_name)?;
    raw.parse().map_err(|_| Error::InvalidAddress {
        name: export_name.to_string(),
        value: raw.to_string(),
    })
}

pub fn state_list_command(config: &Config) -> Command {
    let mut cmd = command(config);
    cmd.args(&["state", "list"]);
    cmd
}

/// Addresses of every resource terraform currently tracks.
pub fn state_list(config: &Config) -> Result<Vec<String>, Error> {
    let out = handle_command_error(state_list_command(config))?;
    let stdout = String::from_utf8_lossy(&out.stdout);
    let resources: Vec<String> = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect();
    if resources.is_empty() {
        warn!("terraform state in {} is empty", config.workdir.display());
    }
    Ok(resources)
}

pub fn passthrough<I, S>(config: &Config, args: I) -> Result<(), Error>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = command(config);
    cmd.args(args);
    check_cmd(&mut cmd)
}
