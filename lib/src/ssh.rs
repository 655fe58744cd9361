use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;
use tokio::{net::TcpStream, time};

use log::{info, warn};
use shellexpand::tilde;

use crate::error::Error;

pub const SSH_USER: &str = "ec2-user";

pub async fn wait_for_ssh(ip: &IpAddr) -> Result<(), Error> {
    wait_for_port(ip, 22, 10000, 30).await
}

pub async fn wait_for_port(
    ip: &IpAddr,
    port: u16,
    duration_in_ms: u64,
    attempts: usize,
) -> Result<(), Error> {
    let addr = format!("{}:{}", ip, port);
    let timeout_duration = Duration::from_millis(duration_in_ms);
    let mut interval = time::interval(timeout_duration);

    for _ in 0..attempts {
        let stream = TcpStream::connect(addr.clone());
        match time::timeout(timeout_duration, stream).await {
            Ok(Ok(_)) => {
                info!("{} is accepting connections", addr);
                return Ok(());
            }
            Ok(Err(e)) => {
                warn!("error while connecting to {}: {}", addr, e);
                interval.tick().await;
            }
            Err(e) => warn!("Waiting for {} to respond: {}", addr, e),
        }
    }
    Err(Error::ExhaustedAttempts(attempts))
}

/// Arguments for `ssh` into the instance behind `ip`. The key pair's private
/// half is picked up from `~/.ssh/<key_name>.pem` when it exists.
pub fn ssh_args(ip: &IpAddr, key_name: &str, mut args: Vec<String>) -> Vec<String> {
    let mut flags = vec![
        "-o".to_string(),
        "StrictHostKeyChecking=accept-new".into(),
        "-p".into(),
        "22".into(),
    ];

    let key_path = tilde(&format!("~/.ssh/{}.pem", key_name)).to_string();
    if Path::new(&key_path).is_file() {
        flags.push("-i".to_string());
        flags.push(key_path);
    }

    flags.push(format!("{}@{}", SSH_USER, ip));
    if !args.is_empty() {
        flags.push("-t".to_string());
    }
    flags.append(&mut args);
    flags
}
