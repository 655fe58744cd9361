//! Renders a [`Stack`] into a terraform JSON configuration.
//!
//! Every cross-resource reference is a terraform interpolation, so the engine
//! derives creation order on its own. Maps are ordered, which keeps the
//! rendered document byte-for-byte stable for an unchanged declaration.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info};
use serde_json::{json, Value};

use crate::{
    error::Error,
    stack::Stack,
    types::{logical_id_to_tf_name, SubnetType, ANY_IPV4},
};

pub const CONFIG_FILE: &str = "main.tf.json";
pub const INSTANCE_ID_OUTPUT: &str = "instance_id";
pub const AWS_PROVIDER_SOURCE: &str = "hashicorp/aws";
pub const AWS_PROVIDER_VERSION: &str = "~> 5.0";
const ZONES: &str = "data.aws_availability_zones.available.names";

#[derive(Default)]
struct Document {
    data: BTreeMap<String, BTreeMap<String, Value>>,
    resource: BTreeMap<String, BTreeMap<String, Value>>,
    output: BTreeMap<String, Value>,
}

impl Document {
    fn data(&mut self, kind: &str, name: &str, body: Value) {
        self.data
            .entry(kind.to_string())
            .or_default()
            .insert(name.to_string(), body);
    }

    fn resource(&mut self, kind: &str, name: &str, body: Value) {
        self.resource
            .entry(kind.to_string())
            .or_default()
            .insert(name.to_string(), body);
    }

    fn output(&mut self, name: &str, body: Value) {
        self.output.insert(name.to_string(), body);
    }
}

fn tags(logical_id: &str) -> Value {
    json!({ "Name": logical_id })
}

/// Validate the stack and render it.
pub fn synth(stack: &Stack) -> Result<Value, Error> {
    stack.validate()?;
    info!("synthesizing stack {}", stack.id);

    let mut doc = Document::default();

    doc.data(
        "aws_availability_zones",
        "available",
        json!({ "state": "available" }),
    );

    let vpc = logical_id_to_tf_name(&stack.network.logical_id);
    let igw = format!("{}_igw", vpc);
    let prefix = stack
        .network
        .prefix_len()
        .ok_or_else(|| Error::Validation(format!("malformed vpc cidr `{}`", stack.network.cidr)))?;

    doc.resource(
        "aws_vpc",
        &vpc,
        json!({
            "cidr_block": stack.network.cidr,
            "enable_dns_hostnames": true,
            "enable_dns_support": true,
            "tags": tags(&stack.network.logical_id),
        }),
    );
    doc.resource(
        "aws_internet_gateway",
        &igw,
        json!({
            "vpc_id": format!("${{aws_vpc.{}.id}}", vpc),
            "tags": tags(&stack.network.logical_id),
        }),
    );

    let mut first_public_subnet = None;
    let mut public_routes = Vec::new();
    for (offset, subnet) in stack.network.subnet_configuration.iter().enumerate() {
        let name = logical_id_to_tf_name(&subnet.name);
        let newbits = subnet.cidr_mask - prefix;
        let netnum = if offset == 0 {
            "count.index".to_string()
        } else {
            format!("count.index + {}", offset * stack.network.max_azs as usize)
        };
        let public = subnet.subnet_type == SubnetType::Public;
        let count = format!("${{min(length({}), {})}}", ZONES, stack.network.max_azs);

        doc.resource(
            "aws_subnet",
            &name,
            json!({
                "count": count,
                "vpc_id": format!("${{aws_vpc.{}.id}}", vpc),
                "availability_zone": format!("${{{}[count.index]}}", ZONES),
                "cidr_block": format!(
                    "${{cidrsubnet(aws_vpc.{}.cidr_block, {}, {})}}",
                    vpc, newbits, netnum
                ),
                "map_public_ip_on_launch": public,
                "tags": {
                    "Name": format!("{}/{}", stack.network.logical_id, subnet.name),
                    "SubnetType": format!("{:?}", subnet.subnet_type),
                },
            }),
        );

        if !public {
            continue;
        }
        first_public_subnet.get_or_insert_with(|| name.clone());

        let table = format!("{}_rt", name);
        let route = format!("{}_default", name);
        doc.resource(
            "aws_route_table",
            &table,
            json!({
                "vpc_id": format!("${{aws_vpc.{}.id}}", vpc),
                "tags": tags(&format!("{}/{}", stack.network.logical_id, subnet.name)),
            }),
        );
        doc.resource(
            "aws_route",
            &route,
            json!({
                "route_table_id": format!("${{aws_route_table.{}.id}}", table),
                "destination_cidr_block": ANY_IPV4,
                "gateway_id": format!("${{aws_internet_gateway.{}.id}}", igw),
            }),
        );
        doc.resource(
            "aws_route_table_association",
            &table,
            json!({
                "count": count,
                "subnet_id": format!("${{aws_subnet.{}[count.index].id}}", name),
                "route_table_id": format!("${{aws_route_table.{}.id}}", table),
            }),
        );
        public_routes.push(format!("aws_route.{}", route));
    }
    let subnet = first_public_subnet
        .ok_or_else(|| Error::Validation("no public subnet to place the instance in".into()))?;

    let sg = logical_id_to_tf_name(&stack.security_group.logical_id);
    doc.resource(
        "aws_security_group",
        &sg,
        json!({
            "name": stack.security_group.logical_id,
            "description": stack.security_group.description,
            "vpc_id": format!("${{aws_vpc.{}.id}}", vpc),
            "tags": tags(&stack.security_group.logical_id),
        }),
    );
    for rule in &stack.security_group.ingress_rules {
        let name = format!("{}_{}", sg, rule.tf_name());
        doc.resource(
            "aws_vpc_security_group_ingress_rule",
            &name,
            json!({
                "security_group_id": format!("${{aws_security_group.{}.id}}", sg),
                "description": rule.description,
                "cidr_ipv4": rule.peer.cidr_block(),
                "ip_protocol": rule.port.protocol.as_str(),
                "from_port": rule.port.from,
                "to_port": rule.port.to,
            }),
        );
    }
    if stack.security_group.allow_all_outbound {
        doc.resource(
            "aws_vpc_security_group_egress_rule",
            &format!("{}_all_outbound", sg),
            json!({
                "security_group_id": format!("${{aws_security_group.{}.id}}", sg),
                "description": "Allow all outbound traffic by default",
                "cidr_ipv4": ANY_IPV4,
                "ip_protocol": "-1",
            }),
        );
    }

    let instance = logical_id_to_tf_name(&stack.instance.logical_id);
    let ami = format!("{}_ami", instance);
    doc.data(
        "aws_ami",
        &ami,
        json!({
            "most_recent": true,
            "owners": [stack.instance.machine_image.owner()],
            "filter": [
                { "name": "name", "values": [stack.instance.machine_image.name_filter()] },
                { "name": "virtualization-type", "values": ["hvm"] },
            ],
        }),
    );
    doc.resource(
        "aws_instance",
        &instance,
        json!({
            "ami": format!("${{data.aws_ami.{}.id}}", ami),
            "instance_type": stack.instance.instance_type.to_string(),
            "key_name": stack.instance.key_name,
            "subnet_id": format!("${{aws_subnet.{}[0].id}}", subnet),
            "vpc_security_group_ids": [format!("${{aws_security_group.{}.id}}", sg)],
            "depends_on": public_routes,
            "tags": tags(&stack.instance.logical_id),
        }),
    );

    let eip = logical_id_to_tf_name(&stack.address.logical_id);
    doc.resource(
        "aws_eip",
        &eip,
        json!({
            "domain": "vpc",
            "tags": tags(&stack.address.logical_id),
        }),
    );
    doc.resource(
        "aws_eip_association",
        &logical_id_to_tf_name(&stack.association.logical_id),
        json!({
            "allocation_id": format!("${{aws_eip.{}.id}}", eip),
            "instance_id": format!("${{aws_instance.{}.id}}", instance),
        }),
    );

    if let Some(dns) = &stack.dns {
        let record = logical_id_to_tf_name(&dns.logical_id);
        let zone = format!("{}_zone", record);
        doc.data("aws_route53_zone", &zone, json!({ "name": dns.zone }));
        doc.resource(
            "aws_route53_record",
            &record,
            json!({
                "zone_id": format!("${{data.aws_route53_zone.{}.zone_id}}", zone),
                "name": dns.record_name,
                "type": "A",
                "ttl": dns.ttl,
                "records": [format!("${{aws_eip.{}.public_ip}}", eip)],
            }),
        );
    }

    doc.output(
        &stack.output.export_name,
        json!({
            "description": stack.output.logical_id,
            "value": format!("${{aws_eip.{}.public_ip}}", eip),
        }),
    );
    doc.output(
        INSTANCE_ID_OUTPUT,
        json!({ "value": format!("${{aws_instance.{}.id}}", instance) }),
    );

    debug!(
        "rendered {} resource kinds, {} outputs",
        doc.resource.len(),
        doc.output.len()
    );

    Ok(json!({
        "terraform": {
            "required_providers": {
                "aws": { "source": AWS_PROVIDER_SOURCE, "version": AWS_PROVIDER_VERSION },
            },
        },
        "provider": { "aws": { "region": stack.region } },
        "data": doc.data,
        "resource": doc.resource,
        "output": doc.output,
    }))
}

/// Write the rendered configuration into `dir`, creating it if needed.
pub fn write(document: &Value, dir: &Path) -> Result<PathBuf, Error> {
    fs::create_dir_all(dir)?;
    let path = dir.join(CONFIG_FILE);
    let mut rendered = serde_json::to_string_pretty(document)?;
    rendered.push('\n');
    fs::write(&path, rendered)?;
    info!("wrote {}", path.display());
    Ok(path)
}
