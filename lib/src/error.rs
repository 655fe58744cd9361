use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid declaration: {0}")]
    Validation(String),
    #[error("`{command}` failed: {details}")]
    CommandFailed { command: String, details: String },
    #[error("`{0}` was interrupted")]
    Interrupted(String),
    #[error("`{command}` exited with unexpected status {code}")]
    UnexpectedStatus { command: String, code: i32 },
    #[error("output `{0}` is missing from terraform state")]
    MissingOutput(String),
    #[error("output `{name}` is not an IP address: {value}")]
    InvalidAddress { name: String, value: String },
    #[error("exhausted {0} attempts")]
    ExhaustedAttempts(usize),
    #[error("io error")]
    Io(#[from] std::io::Error),
    #[error("error parsing json")]
    Serde(#[from] serde_json::Error),
}
