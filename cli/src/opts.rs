use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use warden_lib::config::Overrides;

#[derive(Parser)]
#[clap(name = "warden", version, about = "Declare and deploy the Bitwarden host")]
pub struct Warden {
    #[clap(
        long,
        global = true,
        env = "WARDEN_CONFIG",
        value_name = "FILE",
        help = "JSON file with deployment settings"
    )]
    pub config: Option<PathBuf>,
    #[clap(
        long,
        global = true,
        env = "WARDEN_STACK",
        value_name = "NAME",
        help = "Name of the stack, used for logical ids and the plan file"
    )]
    pub stack: Option<String>,
    #[clap(
        long,
        global = true,
        env = "AWS_DEFAULT_REGION",
        value_name = "REGION",
        help = "The AWS region to deploy into"
    )]
    pub region: Option<String>,
    #[clap(
        long,
        global = true,
        env = "WARDEN_KEY_NAME",
        value_name = "NAME",
        help = "EC2 key pair used to reach the instance"
    )]
    pub key_name: Option<String>,
    #[clap(
        long,
        global = true,
        env = "WARDEN_WORKDIR",
        value_name = "DIR",
        help = "Directory holding the synthesized config and terraform state"
    )]
    pub workdir: Option<PathBuf>,
    #[clap(
        long,
        global = true,
        env = "WARDEN_TERRAFORM",
        value_name = "BIN",
        help = "terraform binary to drive",
        hide = true
    )]
    pub terraform: Option<String>,
    #[clap(subcommand)]
    pub command: SubCommands,
}

impl Warden {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            stack: self.stack.clone(),
            region: self.region.clone(),
            key_name: self.key_name.clone(),
            workdir: self.workdir.clone(),
            terraform: self.terraform.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum SubCommands {
    Synth(Synth),
    Plan(Plan),
    #[clap(about = "terraform apply of the last plan")]
    Apply,
    Deploy(Deploy),
    #[clap(about = "Tear down every resource of the stack")]
    Destroy,
    Output(Output),
    #[clap(about = "Exit 2 if applying the declaration again would change anything")]
    Drift,
    #[clap(about = "Check that the Elastic IP is bound to the declared instance")]
    Verify,
    Info(Info),
    #[clap(trailing_var_arg = true)]
    Ssh(Ssh),
    #[clap(
        aliases = &["tf", "passthrough", "passthru", "pt"],
        trailing_var_arg = true
    )]
    Terraform(Passthrough),
    Completions(Completions),
}

#[derive(Parser)]
#[clap(about = "Write the terraform configuration for the stack")]
pub struct Synth {
    #[clap(long, short, help = "print the typed declaration as JSON instead")]
    pub describe: bool,
}

#[derive(Parser)]
#[clap(about = "terraform plan")]
pub struct Plan {
    #[clap(long, short, help = "create a destruction plan")]
    pub destroy: bool,
}

#[derive(Parser)]
#[clap(about = "Plan and apply, then print the Elastic IP")]
pub struct Deploy {
    #[clap(long, short, help = "wait until SSH answers on the Elastic IP")]
    pub wait: bool,
}

#[derive(Parser)]
#[clap(about = "Print the exported Elastic IP")]
pub struct Output {
    #[clap(long, short, help = "print every output as JSON")]
    pub json: bool,
}

#[derive(Parser)]
#[clap(about = "Show information about the instance and its address")]
pub struct Info {
    #[clap(long, short, help = "output as JSON")]
    pub json: bool,
}

#[derive(Parser)]
#[clap(about = "SSH to the instance")]
pub struct Ssh {
    #[clap(multiple_values = true, allow_hyphen_values = true, help = "arguments to ssh")]
    pub args: Vec<String>,
}

#[derive(Parser)]
#[clap(about = "delegate to terraform")]
pub struct Passthrough {
    #[clap(long, short, help = "skip regenerating the terraform config")]
    pub no_config: bool,
    #[clap(
        long,
        short,
        help = "delete and reinitialize the `.terraform` state dir before delegating to terraform"
    )]
    pub init: bool,
    #[clap(multiple_values = true, allow_hyphen_values = true, help = "arguments to terraform")]
    pub args: Vec<String>,
}

#[derive(Parser)]
#[clap(about = "Generate shell completion files")]
pub struct Completions {
    #[clap(help = "bash, elvish, fish, powershell, or zsh")]
    pub shell: Shell,
}
