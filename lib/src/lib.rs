pub mod config;
pub mod error;
pub mod info;
pub mod ssh;
pub mod stack;
pub mod synth;
pub mod terraform;
pub mod types;

use std::process::{Command, Output, Stdio};

use execute::Execute;
use log::info;

use error::Error;

/// Render a command the way a user would type it.
pub(crate) fn describe(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().to_string()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().to_string()));
    parts.join(" ")
}

/// Run a command with inherited stdio and fail unless it exits with 0.
pub(crate) fn check_cmd(cmd: &mut Command) -> Result<(), Error> {
    info!("run: {:?}", cmd);
    let status = cmd.status()?;
    match status.code() {
        Some(0) => Ok(()),
        Some(code) => Err(Error::CommandFailed {
            command: describe(cmd),
            details: format!("exit status {}", code),
        }),
        None => Err(Error::Interrupted(describe(cmd))),
    }
}

/// Run a command capturing stdout and stderr. A non-zero exit turns stderr
/// into the error details.
pub(crate) fn handle_command_error(mut command: Command) -> Result<Output, Error> {
    info!("run: {:?}", command);
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    let output = command.execute_output().map_err(|e| Error::CommandFailed {
        command: describe(&command),
        details: e.to_string(),
    })?;
    match output.status.code() {
        Some(0) => Ok(output),
        Some(_) => Err(Error::CommandFailed {
            command: describe(&command),
            details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }),
        None => Err(Error::Interrupted(describe(&command))),
    }
}
