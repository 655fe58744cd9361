//! Deployment settings.
//!
//! Defaults reproduce the Bitwarden host exactly; a JSON file and the CLI can
//! override the handful of values that are not part of the declaration itself.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const DEFAULT_STACK: &str = "Bitwarden";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_KEY_NAME: &str = "bitwarden";
pub const DEFAULT_VPC_CIDR: &str = "10.0.0.0/16";
pub const DEFAULT_WORKDIR: &str = ".warden";
pub const DEFAULT_TERRAFORM: &str = "terraform";
pub const DEFAULT_DNS_TTL: u32 = 300;

fn default_stack() -> String {
    DEFAULT_STACK.to_string()
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_key_name() -> String {
    DEFAULT_KEY_NAME.to_string()
}

fn default_vpc_cidr() -> String {
    DEFAULT_VPC_CIDR.to_string()
}

fn default_workdir() -> PathBuf {
    PathBuf::from(DEFAULT_WORKDIR)
}

fn default_terraform() -> String {
    DEFAULT_TERRAFORM.to_string()
}

fn default_dns_ttl() -> u32 {
    DEFAULT_DNS_TTL
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_stack")]
    pub stack: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_key_name")]
    pub key_name: String,
    #[serde(default = "default_vpc_cidr")]
    pub vpc_cidr: String,
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,
    #[serde(default = "default_terraform")]
    pub terraform: String,
    #[serde(default)]
    pub dns: Option<DnsConfig>,
}

/// Binds a name in an existing hosted zone to the static address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DnsConfig {
    pub zone: String,
    pub record: String,
    #[serde(default = "default_dns_ttl")]
    pub ttl: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            stack: default_stack(),
            region: default_region(),
            key_name: default_key_name(),
            vpc_cidr: default_vpc_cidr(),
            workdir: default_workdir(),
            terraform: default_terraform(),
            dns: None,
        }
    }
}

/// Values supplied on the command line or through the environment. `None`
/// keeps whatever the file (or the default) says.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub stack: Option<String>,
    pub region: Option<String>,
    pub key_name: Option<String>,
    pub workdir: Option<PathBuf>,
    pub terraform: Option<String>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self, Error> {
        let base = match path {
            Some(path) => {
                debug!("loading config from {}", path.display());
                Config::from_file(path)?
            }
            None => Config::default(),
        };
        Ok(base.with_overrides(overrides))
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(stack) = overrides.stack {
            self.stack = stack;
        }
        if let Some(region) = overrides.region {
            self.region = region;
        }
        if let Some(key_name) = overrides.key_name {
            self.key_name = key_name;
        }
        if let Some(workdir) = overrides.workdir {
            self.workdir = workdir;
        }
        if let Some(terraform) = overrides.terraform {
            self.terraform = terraform;
        }
        self
    }

    pub fn plan_file(&self) -> String {
        format!("{}.plan", self.stack)
    }
}
