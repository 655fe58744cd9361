use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{generate, Shell};
use colored::*;
use log::*;
use prettytable::{cell, row, Table};
use std::{io, net::IpAddr, process::Command};
use warden_lib::{
    config::Config,
    info::{address_info, instance_info, verify_association},
    ssh,
    stack::Stack,
    synth,
    terraform::{self, Drift, TerraformOutputs},
};

use crate::opts::Warden;

pub(crate) fn synth(config: &Config, stack: &Stack, describe: bool) -> Result<()> {
    if describe {
        let stdout = io::stdout();
        let handle = stdout.lock();
        serde_json::to_writer_pretty(handle, stack)?;
        println!();
        return Ok(());
    }

    let document = synth::synth(stack).context("stack declaration is invalid")?;
    let path = synth::write(&document, &config.workdir)?;
    println!("{}", path.display());
    Ok(())
}

/// Run `terraform plan` for the stack
///
/// # Arguments
///
/// * `config` - deployment settings, the working directory among them
/// * `stack` - the declaration to synthesize before planning
/// * `destroy` - create a destruction plan instead
pub(crate) fn plan(config: &Config, stack: &Stack, destroy: bool) -> Result<()> {
    terraform::prepare(config, stack).context("failed to prepare terraform")?;
    terraform::plan(config, destroy)?;
    Ok(())
}

pub(crate) fn apply(config: &Config, stack: &Stack) -> Result<()> {
    terraform::prepare(config, stack).context("failed to prepare terraform")?;
    terraform::apply(config).with_context(|| {
        format!(
            "failed to apply {}, run `warden plan` first",
            config.plan_file()
        )
    })?;
    Ok(())
}

pub(crate) async fn deploy(config: &Config, stack: &Stack, wait: bool) -> Result<()> {
    plan(config, stack, false)?;
    terraform::apply(config)?;

    let ip = exported_ip(config, stack)?;
    println!("{}", ip);

    if wait {
        info!("waiting for ssh on {}", ip);
        ssh::wait_for_ssh(&ip)
            .await
            .with_context(|| format!("{} never answered on port 22", ip))?;
    }
    Ok(())
}

pub(crate) fn destroy(config: &Config, stack: &Stack) -> Result<()> {
    terraform::prepare(config, stack).context("failed to prepare terraform")?;
    terraform::destroy(config)?;

    let remaining = terraform::state_list(config)?;
    if !remaining.is_empty() {
        anyhow::bail!("resources left after destroy: {}", remaining.join(", "));
    }
    println!("{}", format!("stack {} destroyed", stack.id).green());
    Ok(())
}

pub(crate) fn output(config: &Config, stack: &Stack, json: bool) -> Result<()> {
    let outputs = terraform::output(config)?;
    if json {
        let values: serde_json::Map<String, serde_json::Value> = outputs
            .into_iter()
            .map(|(name, output)| (name, output.value))
            .collect();
        let stdout = io::stdout();
        serde_json::to_writer_pretty(stdout.lock(), &values)?;
        println!();
    } else {
        println!("{}", terraform::elastic_ip(&outputs, &stack.output.export_name)?);
    }
    Ok(())
}

pub(crate) fn drift(config: &Config, stack: &Stack) -> Result<Drift> {
    terraform::prepare(config, stack).context("failed to prepare terraform")?;
    let drift = terraform::drift(config)?;
    match drift {
        Drift::None => println!("{}", "No changes. Infrastructure matches the declaration.".green()),
        Drift::Changes => println!("{}", "Changes pending, run `warden deploy` to converge.".yellow()),
    }
    Ok(drift)
}

pub(crate) async fn verify(config: &Config, stack: &Stack) -> Result<()> {
    let outputs = terraform::output(config)?;
    let ip = terraform::elastic_ip(&outputs, &stack.output.export_name)?;
    let instance_id = terraform::output_str(&outputs, synth::INSTANCE_ID_OUTPUT)?;

    let address = verify_association(&ip, instance_id, &config.region).await?;
    println!(
        "{}",
        format!(
            "{} ({}) is associated with {}",
            ip,
            address.allocation_id.unwrap_or_default(),
            instance_id
        )
        .green()
    );
    Ok(())
}

pub(crate) async fn info(config: &Config, stack: &Stack, json: bool) -> Result<()> {
    let outputs = terraform::output(config)?;
    let ip = terraform::elastic_ip(&outputs, &stack.output.export_name)?;
    let instance_id = terraform::output_str(&outputs, synth::INSTANCE_ID_OUTPUT)?;

    let instances = instance_info(instance_id, &config.region).await?;
    let addresses = address_info(&ip, &config.region).await?;
    let association = addresses
        .first()
        .and_then(|a| a.association_id.clone())
        .unwrap_or_default();

    if json {
        let nodes: Vec<serde_json::Value> = instances
            .iter()
            .map(|i| {
                serde_json::json!({
                    "id": i.instance_id,
                    "type": i.instance_type,
                    "state": i.state.as_ref().and_then(|s| s.name.clone()),
                    "private_ip": i.private_ip_address,
                    "public_ip": i.public_ip_address,
                })
            })
            .collect();
        let stdout = io::stdout();
        serde_json::to_writer_pretty(
            stdout.lock(),
            &serde_json::json!({
                "stack": stack.id,
                "region": config.region,
                "elastic_ip": ip.to_string(),
                "association": association,
                "instances": nodes,
            }),
        )?;
        println!();
    } else {
        let mut table = Table::new();
        table.add_row(row!["Instance", "Type", "State", "Private IP", "Public IP", "Association"]);
        for i in instances {
            table.add_row(row![
                i.instance_id.unwrap_or_default(),
                i.instance_type.unwrap_or_default(),
                i.state.and_then(|s| s.name).unwrap_or_default(),
                i.private_ip_address.unwrap_or_default(),
                i.public_ip_address.unwrap_or_default(),
                association
            ]);
        }
        table.printstd();
    }
    Ok(())
}

pub(crate) fn ssh(config: &Config, stack: &Stack, args: Vec<String>) -> Result<()> {
    let ip = exported_ip(config, stack)?;
    let ssh_args = ssh::ssh_args(&ip, &config.key_name, args);

    let mut cmd = Command::new("ssh");
    let cmd_with_args = cmd.args(ssh_args);
    info!("cmd: {:?}", cmd_with_args);

    cmd.spawn()
        .context("ssh command failed")?
        .wait()
        .context("ssh command didn't finish?")?;
    Ok(())
}

/// Run any terraform command in the working directory
pub(crate) fn terraform_passthrough(
    config: &Config,
    stack: &Stack,
    init: bool,
    no_config: bool,
    args: Vec<String>,
) -> Result<()> {
    if !no_config {
        let document = synth::synth(stack)?;
        synth::write(&document, &config.workdir)?;
    }

    if init {
        terraform::init(config, false)?;
    }

    terraform::passthrough(config, args)?;
    Ok(())
}

pub(crate) fn completions(shell: Shell) -> Result<()> {
    let mut app = Warden::command();
    generate(shell, &mut app, "warden", &mut io::stdout());
    Ok(())
}

fn exported_ip(config: &Config, stack: &Stack) -> Result<IpAddr> {
    let outputs: TerraformOutputs = terraform::output(config)?;
    let ip = terraform::elastic_ip(&outputs, &stack.output.export_name)
        .context("is the stack deployed? run `warden deploy`")?;
    Ok(ip)
}
