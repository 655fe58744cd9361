mod cli;
mod opts;

use anyhow::{Context, Result};
use clap::Parser;
use opts::{SubCommands, Warden};
use warden_lib::{config::Config, stack::Stack, terraform::Drift};

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();

    let opts = Warden::parse();
    let config = Config::load(opts.config.as_deref(), opts.overrides())
        .context("failed to load config")?;
    let stack = Stack::declare(&config);

    match opts.command {
        SubCommands::Synth(sub) => cli::synth(&config, &stack, sub.describe),
        SubCommands::Plan(sub) => cli::plan(&config, &stack, sub.destroy),
        SubCommands::Apply => cli::apply(&config, &stack),
        SubCommands::Deploy(sub) => cli::deploy(&config, &stack, sub.wait).await,
        SubCommands::Destroy => cli::destroy(&config, &stack),
        SubCommands::Output(sub) => cli::output(&config, &stack, sub.json),
        SubCommands::Drift => {
            if cli::drift(&config, &stack)? == Drift::Changes {
                std::process::exit(2);
            }
            Ok(())
        }
        SubCommands::Verify => cli::verify(&config, &stack).await,
        SubCommands::Info(sub) => cli::info(&config, &stack, sub.json).await,
        SubCommands::Ssh(sub) => cli::ssh(&config, &stack, sub.args),
        SubCommands::Terraform(sub) => {
            cli::terraform_passthrough(&config, &stack, sub.init, sub.no_config, sub.args)
        }
        SubCommands::Completions(sub) => cli::completions(sub.shell),
    }?;
    Ok(())
}
