use rusoto_core::Region;
use rusoto_ec2::{
    Address, DescribeAddressesRequest, DescribeInstancesRequest, Ec2, Ec2Client, Instance,
};
use std::{net::IpAddr, str::FromStr};

use anyhow::{bail, Context, Result};
use log::info;

fn client(region_name: &str) -> Result<Ec2Client> {
    let region = Region::from_str(region_name)
        .with_context(|| format!("Region not found: {}", region_name))?;
    Ok(Ec2Client::new(region))
}

pub async fn address_info(ip: &IpAddr, region_name: &str) -> Result<Vec<Address>> {
    let request = DescribeAddressesRequest {
        public_ips: Some(vec![ip.to_string()]),
        ..Default::default()
    };
    let response = client(region_name)?
        .describe_addresses(request)
        .await
        .context("Unable to fetch Elastic IP info")?;
    Ok(response.addresses.unwrap_or_default())
}

pub async fn instance_info(instance_id: &str, region_name: &str) -> Result<Vec<Instance>> {
    let request = DescribeInstancesRequest {
        instance_ids: Some(vec![instance_id.to_string()]),
        ..Default::default()
    };

    let response = client(region_name)?
        .describe_instances(request)
        .await
        .context("Unable to fetch EC2 Instance info")?;

    Ok(response
        .reservations
        .unwrap_or_default()
        .into_iter()
        .flat_map(|reservation| reservation.instances.unwrap_or_default())
        .collect())
}

/// The single address record, provided it is associated with `instance_id`.
pub fn check_association(addresses: Vec<Address>, ip: &IpAddr, instance_id: &str) -> Result<Address> {
    let mut addresses = addresses.into_iter();
    let address = match (addresses.next(), addresses.next()) {
        (Some(address), None) => address,
        (None, _) => bail!("no Elastic IP {} found", ip),
        (Some(_), Some(_)) => bail!("more than one address record for {}", ip),
    };
    match (&address.association_id, &address.instance_id) {
        (Some(_), Some(id)) if id == instance_id => Ok(address),
        (Some(_), Some(id)) => bail!(
            "Elastic IP {} is associated with {} instead of {}",
            ip,
            id,
            instance_id
        ),
        _ => bail!("Elastic IP {} is not associated with any instance", ip),
    }
}

pub async fn verify_association(ip: &IpAddr, instance_id: &str, region_name: &str) -> Result<Address> {
    info!("verifying {} is bound to {}", ip, instance_id);
    let addresses = address_info(ip, region_name).await?;
    check_association(addresses, ip, instance_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip() -> IpAddr {
        "54.12.34.56".parse().unwrap()
    }

    fn address(instance: Option<&str>) -> Address {
        Address {
            public_ip: Some(ip().to_string()),
            allocation_id: Some("eipalloc-1".into()),
            association_id: instance.map(|_| "eipassoc-1".to_string()),
            instance_id: instance.map(String::from),
            domain: Some("vpc".into()),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_the_declared_instance() {
        let found = check_association(vec![address(Some("i-1"))], &ip(), "i-1").unwrap();
        assert_eq!(found.allocation_id.as_deref(), Some("eipalloc-1"));
    }

    #[test]
    fn rejects_other_instance() {
        let err = check_association(vec![address(Some("i-2"))], &ip(), "i-1").unwrap_err();
        assert!(err.to_string().contains("instead of i-1"));
    }

    #[test]
    fn rejects_unassociated_or_missing() {
        assert!(check_association(vec![address(None)], &ip(), "i-1").is_err());
        assert!(check_association(Vec::new(), &ip(), "i-1").is_err());
    }

    #[test]
    fn rejects_duplicates() {
        let addresses = vec![address(Some("i-1")), address(Some("i-1"))];
        assert!(check_association(addresses, &ip(), "i-1").is_err());
    }

    #[test]
    fn unknown_region_is_an_error() {
        assert!(client("mars-north-1").is_err());
    }
}
