use std::fmt;

use serde::{Deserialize, Serialize};

/// Cidr block that matches every IPv4 address.
pub const ANY_IPV4: &str = "0.0.0.0/0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubnetType {
    Public,
    Private,
    Isolated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetConfiguration {
    pub name: String,
    pub cidr_mask: u8,
    pub subnet_type: SubnetType,
}

/// An isolated virtual network and the subnet layout it spreads across zones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub logical_id: String,
    pub cidr: String,
    pub max_azs: u8,
    pub nat_gateways: u8,
    pub subnet_configuration: Vec<SubnetConfiguration>,
}

impl Network {
    /// Number of subnets the network ends up with when the region offers
    /// `zones` availability zones.
    pub fn subnet_count(&self, zones: usize) -> usize {
        self.subnet_configuration.len() * zones.min(self.max_azs as usize)
    }

    pub fn subnets_of(&self, kind: SubnetType) -> impl Iterator<Item = &SubnetConfiguration> {
        self.subnet_configuration
            .iter()
            .filter(move |s| s.subnet_type == kind)
    }

    /// Prefix length of the network cidr, `None` when the cidr is malformed.
    pub fn prefix_len(&self) -> Option<u8> {
        let (addr, prefix) = self.cidr.split_once('/')?;
        addr.parse::<std::net::Ipv4Addr>().ok()?;
        prefix.parse().ok().filter(|p| *p <= 32)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Peer {
    AnyIpv4,
    Cidr(String),
}

impl Peer {
    pub fn any_ipv4() -> Self {
        Peer::AnyIpv4
    }

    pub fn cidr_block(&self) -> &str {
        match self {
            Peer::AnyIpv4 => ANY_IPV4,
            Peer::Cidr(cidr) => cidr.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    All,
}

impl Protocol {
    /// The protocol name as the EC2 API spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::All => "-1",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Port {
    pub protocol: Protocol,
    pub from: u16,
    pub to: u16,
}

impl Port {
    pub fn tcp(port: u16) -> Self {
        Port {
            protocol: Protocol::Tcp,
            from: port,
            to: port,
        }
    }

    pub fn all_traffic() -> Self {
        Port {
            protocol: Protocol::All,
            from: 0,
            to: 0,
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.protocol {
            Protocol::All => write!(f, "all traffic"),
            p if self.from == self.to => write!(f, "{}/{}", self.from, p.as_str()),
            p => write!(f, "{}-{}/{}", self.from, self.to, p.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    pub peer: Peer,
    pub port: Port,
    pub description: String,
}

impl IngressRule {
    /// Terraform name suffix, distinct for every protocol, port range and
    /// source. `tcp_22_22_0_0_0_0_0` for SSH from anywhere.
    pub fn tf_name(&self) -> String {
        let protocol = match self.port.protocol {
            Protocol::All => "all",
            p => p.as_str(),
        };
        let source: String = self
            .peer
            .cidr_block()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("{}_{}_{}_{}", protocol, self.port.from, self.port.to, source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub logical_id: String,
    pub description: String,
    pub allow_all_outbound: bool,
    pub ingress_rules: Vec<IngressRule>,
}

impl SecurityGroup {
    pub fn new(logical_id: &str, description: &str, allow_all_outbound: bool) -> Self {
        SecurityGroup {
            logical_id: logical_id.to_string(),
            description: description.to_string(),
            allow_all_outbound,
            ingress_rules: Vec::new(),
        }
    }

    pub fn add_ingress_rule(&mut self, peer: Peer, port: Port, description: &str) {
        self.ingress_rules.push(IngressRule {
            peer,
            port,
            description: description.to_string(),
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceClass {
    T2,
    T3,
    T3a,
    M5,
}

impl fmt::Display for InstanceClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            InstanceClass::T2 => "t2",
            InstanceClass::T3 => "t3",
            InstanceClass::T3a => "t3a",
            InstanceClass::M5 => "m5",
        };
        f.write_str(name)
    }
}

/// Sizes are declared smallest first so the derived ordering ranks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceSize {
    Nano,
    Micro,
    Small,
    Medium,
    Large,
    Xlarge,
}

impl InstanceSize {
    pub const SMALLEST: InstanceSize = InstanceSize::Nano;
}

impl fmt::Display for InstanceSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            InstanceSize::Nano => "nano",
            InstanceSize::Micro => "micro",
            InstanceSize::Small => "small",
            InstanceSize::Medium => "medium",
            InstanceSize::Large => "large",
            InstanceSize::Xlarge => "xlarge",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceType {
    pub class: InstanceClass,
    pub size: InstanceSize,
}

impl InstanceType {
    pub fn of(class: InstanceClass, size: InstanceSize) -> Self {
        InstanceType { class, size }
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmazonLinuxGeneration {
    AmazonLinux,
    AmazonLinux2,
}

/// An image resolved by the engine at apply time rather than pinned here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineImage {
    LatestAmazonLinux { generation: AmazonLinuxGeneration },
}

impl MachineImage {
    pub fn latest_amazon_linux(generation: AmazonLinuxGeneration) -> Self {
        MachineImage::LatestAmazonLinux { generation }
    }

    /// Image name pattern handed to the AMI lookup.
    pub fn name_filter(&self) -> &'static str {
        match self {
            MachineImage::LatestAmazonLinux {
                generation: AmazonLinuxGeneration::AmazonLinux2,
            } => "amzn2-ami-hvm-*-x86_64-gp2",
            MachineImage::LatestAmazonLinux {
                generation: AmazonLinuxGeneration::AmazonLinux,
            } => "amzn-ami-hvm-*-x86_64-gp2",
        }
    }

    pub fn owner(&self) -> &'static str {
        match self {
            MachineImage::LatestAmazonLinux { .. } => "amazon",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub logical_id: String,
    pub key_name: String,
    pub instance_type: InstanceType,
    pub machine_image: MachineImage,
    pub network: String,
    pub security_group: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticAddress {
    pub logical_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressAssociation {
    pub logical_id: String,
    pub address: String,
    pub instance: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackOutput {
    pub logical_id: String,
    pub export_name: String,
    pub address: String,
}

/// An A record pointing a name in an existing hosted zone at the address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub logical_id: String,
    pub zone: String,
    pub record_name: String,
    pub address: String,
    pub ttl: u32,
}

/// Turn a logical id such as `Bitwarden-VPC` into a terraform identifier
/// (`bitwarden_vpc`).
pub fn logical_id_to_tf_name(id: &str) -> String {
    let mut name = String::with_capacity(id.len());
    for c in id.chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_lowercase());
        } else if !name.ends_with('_') {
            name.push('_');
        }
    }
    let name = name.trim_matches('_').to_string();
    match name.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => name,
        _ => format!("r_{}", name),
    }
}
