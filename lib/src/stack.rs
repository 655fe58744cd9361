//! The declaration of the Bitwarden host: network, firewall, instance and a
//! static address exported as an output.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::{
    config::Config,
    error::Error,
    types::{
        AddressAssociation, AmazonLinuxGeneration, DnsRecord, Instance, InstanceClass,
        InstanceSize, InstanceType, MachineImage, Network, Peer, Port, SecurityGroup,
        StackOutput, StaticAddress, SubnetConfiguration, SubnetType,
    },
};

pub const MAX_AZS: u8 = 3;
pub const PUBLIC_SUBNET_MASK: u8 = 24;
pub const SMALLEST_SUBNET_MASK: u8 = 28;
pub const EXPORT_NAME: &str = "BitwardenElasticIP";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stack {
    pub id: String,
    pub region: String,
    pub network: Network,
    pub security_group: SecurityGroup,
    pub instance: Instance,
    pub address: StaticAddress,
    pub association: AddressAssociation,
    pub output: StackOutput,
    pub dns: Option<DnsRecord>,
}

impl Stack {
    pub fn declare(config: &Config) -> Stack {
        let id = config.stack.as_str();

        let network = Network {
            logical_id: format!("{}-VPC", id),
            cidr: config.vpc_cidr.clone(),
            max_azs: MAX_AZS,
            nat_gateways: 0,
            subnet_configuration: vec![SubnetConfiguration {
                name: "public-subnet-1".to_string(),
                cidr_mask: PUBLIC_SUBNET_MASK,
                subnet_type: SubnetType::Public,
            }],
        };

        let mut security_group =
            SecurityGroup::new("web-server-sg", "security group for a web server", true);
        security_group.add_ingress_rule(
            Peer::any_ipv4(),
            Port::tcp(22),
            "allow SSH access from anywhere",
        );
        security_group.add_ingress_rule(
            Peer::any_ipv4(),
            Port::tcp(80),
            "allow HTTP traffic from anywhere",
        );
        security_group.add_ingress_rule(
            Peer::any_ipv4(),
            Port::tcp(443),
            "allow HTTPS traffic from anywhere",
        );

        let instance = Instance {
            logical_id: format!("{}-ec2", id),
            key_name: config.key_name.clone(),
            instance_type: InstanceType::of(InstanceClass::T2, InstanceSize::Nano),
            machine_image: MachineImage::latest_amazon_linux(
                AmazonLinuxGeneration::AmazonLinux2,
            ),
            network: network.logical_id.clone(),
            security_group: security_group.logical_id.clone(),
        };

        let address = StaticAddress {
            logical_id: format!("{}IP", id),
        };

        let association = AddressAssociation {
            logical_id: "Ec2Association".to_string(),
            address: address.logical_id.clone(),
            instance: instance.logical_id.clone(),
        };

        let output = StackOutput {
            logical_id: "Elastic IP".to_string(),
            export_name: EXPORT_NAME.to_string(),
            address: address.logical_id.clone(),
        };

        let dns = config.dns.as_ref().map(|dns| DnsRecord {
            logical_id: "recordSet".to_string(),
            zone: dns.zone.clone(),
            record_name: dns.record.clone(),
            address: address.logical_id.clone(),
            ttl: dns.ttl,
        });

        Stack {
            id: id.to_string(),
            region: config.region.clone(),
            network,
            security_group,
            instance,
            address,
            association,
            output,
            dns,
        }
    }

    /// Checks what can be checked before handing the declaration to the
    /// engine. Anything that needs the provider (quotas, key pair existence)
    /// surfaces at apply time instead.
    pub fn validate(&self) -> Result<(), Error> {
        if self.id.trim().is_empty() {
            return invalid("stack id is empty".to_string());
        }
        self.validate_network()?;
        self.validate_security_group()?;
        self.validate_instance()?;
        self.validate_references()?;
        Ok(())
    }

    fn validate_network(&self) -> Result<(), Error> {
        let network = &self.network;
        if network.max_azs == 0 || network.max_azs > MAX_AZS {
            return invalid(format!(
                "max availability zones must be between 1 and {}, got {}",
                MAX_AZS, network.max_azs
            ));
        }
        if network.nat_gateways != 0 {
            return invalid(format!(
                "nat gateways must be 0, got {}",
                network.nat_gateways
            ));
        }
        let prefix = match network.prefix_len() {
            Some(prefix) => prefix,
            None => return invalid(format!("malformed vpc cidr `{}`", network.cidr)),
        };
        for subnet in &network.subnet_configuration {
            if subnet.cidr_mask <= prefix || subnet.cidr_mask > SMALLEST_SUBNET_MASK {
                return invalid(format!(
                    "subnet `{}` mask /{} must be within /{}../{}",
                    subnet.name,
                    subnet.cidr_mask,
                    prefix + 1,
                    SMALLEST_SUBNET_MASK
                ));
            }
        }
        let public = network.subnets_of(SubnetType::Public).count();
        if public != 1 || network.subnet_configuration.len() != 1 {
            return invalid(format!(
                "exactly one public subnet configuration is required, got {} of {}",
                public,
                network.subnet_configuration.len()
            ));
        }
        Ok(())
    }

    fn validate_security_group(&self) -> Result<(), Error> {
        let rules = &self.security_group.ingress_rules;
        if rules.is_empty() {
            return invalid(format!(
                "security group `{}` has no ingress rules",
                self.security_group.logical_id
            ));
        }
        let mut seen = BTreeSet::new();
        for rule in rules {
            if rule.port.from > rule.port.to {
                return invalid(format!("ingress port range {} is inverted", rule.port));
            }
            if !seen.insert(rule.tf_name()) {
                return invalid(format!(
                    "duplicate ingress rule {} from {}",
                    rule.port,
                    rule.peer.cidr_block()
                ));
            }
        }
        Ok(())
    }

    fn validate_instance(&self) -> Result<(), Error> {
        if self.instance.key_name.trim().is_empty() {
            return invalid("instance key pair name is empty".to_string());
        }
        Ok(())
    }

    fn validate_references(&self) -> Result<(), Error> {
        if self.instance.network != self.network.logical_id {
            return invalid(format!(
                "instance references unknown network `{}`",
                self.instance.network
            ));
        }
        if self.instance.security_group != self.security_group.logical_id {
            return invalid(format!(
                "instance references unknown security group `{}`",
                self.instance.security_group
            ));
        }
        if self.association.address != self.address.logical_id
            || self.association.instance != self.instance.logical_id
        {
            return invalid(format!(
                "association `{}` must bind `{}` to `{}`",
                self.association.logical_id, self.address.logical_id, self.instance.logical_id
            ));
        }
        if self.output.address != self.address.logical_id {
            return invalid(format!(
                "output `{}` references unknown address `{}`",
                self.output.logical_id, self.output.address
            ));
        }
        if !is_identifier(&self.output.export_name) {
            return invalid(format!(
                "export name `{}` is not a valid identifier",
                self.output.export_name
            ));
        }
        if let Some(dns) = &self.dns {
            if dns.address != self.address.logical_id {
                return invalid(format!(
                    "dns record `{}` references unknown address `{}`",
                    dns.record_name, dns.address
                ));
            }
            if dns.zone.is_empty() || dns.record_name.is_empty() {
                return invalid("dns zone and record name must both be set".to_string());
            }
        }
        Ok(())
    }
}

fn invalid(message: String) -> Result<(), Error> {
    Err(Error::Validation(message))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DnsConfig;
    use crate::types::{Protocol, ANY_IPV4};
    use pretty_assertions::assert_eq;

    fn stack() -> Stack {
        Stack::declare(&Config::default())
    }

    #[test]
    fn default_declaration_is_valid() {
        stack().validate().unwrap();
    }

    #[test]
    fn network_spans_at_most_three_zones_without_nat() {
        let stack = stack();
        assert!(stack.network.max_azs <= 3);
        assert_eq!(stack.network.nat_gateways, 0);
        assert_eq!(stack.network.subnet_count(6), 3);
        let kinds: BTreeSet<_> = stack
            .network
            .subnet_configuration
            .iter()
            .map(|s| format!("{:?}", s.subnet_type))
            .collect();
        assert_eq!(kinds.into_iter().collect::<Vec<_>>(), vec!["Public"]);
        assert_eq!(stack.network.subnet_configuration[0].cidr_mask, 24);
    }

    #[test]
    fn firewall_allows_exactly_ssh_http_https_from_anywhere() {
        let stack = stack();
        let rules: BTreeSet<_> = stack
            .security_group
            .ingress_rules
            .iter()
            .map(|r| (r.port.protocol, r.port.from, r.port.to, r.peer.cidr_block()))
            .collect();
        let expected: BTreeSet<_> = [22, 80, 443]
            .iter()
            .map(|p| (Protocol::Tcp, *p, *p, ANY_IPV4))
            .collect();
        assert_eq!(rules, expected);
        assert!(stack.security_group.allow_all_outbound);
    }

    #[test]
    fn instance_is_smallest_tier_with_one_network_and_group() {
        let stack = stack();
        assert_eq!(stack.instance.instance_type.size, InstanceSize::SMALLEST);
        assert_eq!(stack.instance.instance_type.to_string(), "t2.nano");
        assert_eq!(stack.instance.network, stack.network.logical_id);
        assert_eq!(stack.instance.security_group, stack.security_group.logical_id);
        assert_eq!(stack.instance.key_name, "bitwarden");
        assert_eq!(stack.instance.logical_id, "Bitwarden-ec2");
    }

    #[test]
    fn address_is_associated_with_the_instance_and_exported() {
        let stack = stack();
        assert_eq!(stack.association.address, stack.address.logical_id);
        assert_eq!(stack.association.instance, stack.instance.logical_id);
        assert_eq!(stack.output.address, stack.address.logical_id);
        assert_eq!(stack.output.export_name, "BitwardenElasticIP");
    }

    #[test]
    fn declaring_twice_gives_the_same_stack() {
        assert_eq!(stack(), stack());
    }

    #[test]
    fn dns_is_off_by_default() {
        assert!(stack().dns.is_none());

        let config = Config {
            dns: Some(DnsConfig {
                zone: "example.com".into(),
                record: "bitwarden.example.com".into(),
                ttl: 60,
            }),
            ..Config::default()
        };
        let stack = Stack::declare(&config);
        stack.validate().unwrap();
        let dns = stack.dns.unwrap();
        assert_eq!(dns.address, stack.address.logical_id);
        assert_eq!(dns.ttl, 60);
    }

    #[test]
    fn rejects_nat_gateways() {
        let mut stack = stack();
        stack.network.nat_gateways = 1;
        assert!(matches!(stack.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn rejects_too_many_zones() {
        let mut stack = stack();
        stack.network.max_azs = 4;
        assert!(stack.validate().is_err());
        stack.network.max_azs = 0;
        assert!(stack.validate().is_err());
    }

    #[test]
    fn rejects_subnet_mask_outside_vpc() {
        let mut stack = stack();
        stack.network.subnet_configuration[0].cidr_mask = 16;
        assert!(stack.validate().is_err());
        stack.network.subnet_configuration[0].cidr_mask = 29;
        assert!(stack.validate().is_err());
    }

    #[test]
    fn rejects_extra_subnet_types() {
        let mut stack = stack();
        stack.network.subnet_configuration.push(SubnetConfiguration {
            name: "private".into(),
            cidr_mask: 24,
            subnet_type: SubnetType::Private,
        });
        assert!(stack.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_ingress() {
        let mut stack = stack();
        stack
            .security_group
            .add_ingress_rule(Peer::any_ipv4(), Port::tcp(22), "again");
        let err = stack.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate ingress rule 22/tcp"));
    }

    #[test]
    fn same_port_from_another_source_is_a_distinct_rule() {
        let mut stack = stack();
        stack.security_group.add_ingress_rule(
            Peer::Cidr("10.1.0.0/16".into()),
            Port::tcp(22),
            "allow SSH from the office",
        );
        stack.validate().unwrap();
    }

    #[test]
    fn rejects_empty_stack_id() {
        for id in ["", "  "] {
            let config = Config {
                stack: id.into(),
                ..Config::default()
            };
            let err = Stack::declare(&config).validate().unwrap_err();
            assert_eq!(err.to_string(), "invalid declaration: stack id is empty");
        }
    }

    #[test]
    fn rejects_empty_key_name() {
        let config = Config {
            key_name: " ".into(),
            ..Config::default()
        };
        assert!(Stack::declare(&config).validate().is_err());
    }

    #[test]
    fn rejects_dangling_association() {
        let mut stack = stack();
        stack.association.instance = "other".into();
        assert!(stack.validate().is_err());
    }

    #[test]
    fn rejects_bad_export_name() {
        let mut stack = stack();
        stack.output.export_name = "Elastic IP".into();
        assert!(stack.validate().is_err());
    }

    #[test]
    fn rejects_malformed_cidr() {
        let config = Config {
            vpc_cidr: "not-a-cidr".into(),
            ..Config::default()
        };
        assert!(Stack::declare(&config).validate().is_err());
    }
}
