//! Check how much of the external network's address space is used.

use std::net::{Ipv4Addr, Ipv6Addr};

use structopt::StructOpt;

use openstack_plugins::args::OpenStackArgs;
use openstack_plugins::auth::Session;
use openstack_plugins::services::{ApiError, NetworkApi, NetworkClient};
use openstack_plugins::{safe_run, PerfData, Report, Status};

/// Compare the used share of the external network's IP pool (floating IPs
/// plus routers with an external gateway) against percentage thresholds.
#[derive(StructOpt, Debug)]
#[structopt(name = "check-ip-pool (part of openstack-plugins)")]
struct Args {
    #[structopt(flatten)]
    os: OpenStackArgs,

    /// Warning threshold as a percentage of the pool, 0-100
    #[structopt(short = "w", long = "warning")]
    warning: u64,

    /// Critical threshold as a percentage of the pool, 0-100
    #[structopt(short = "c", long = "critical")]
    critical: u64,
}

/// The number of addresses a CIDR block spans, saturating at `u64::MAX`
/// for enormous v6 blocks.
fn address_space(cidr: &str) -> Result<u64, String> {
    let (address, prefix) = match cidr.split_once('/') {
        Some(parts) => parts,
        None => return Err(format!("malformed CIDR: {}", cidr)),
    };
    let prefix: u32 = prefix
        .parse()
        .map_err(|_| format!("malformed CIDR: {}", cidr))?;
    let bits: u32 = if address.parse::<Ipv4Addr>().is_ok() {
        32
    } else if address.parse::<Ipv6Addr>().is_ok() {
        128
    } else {
        return Err(format!("malformed CIDR: {}", cidr));
    };
    if prefix > bits {
        return Err(format!("malformed CIDR: {}", cidr));
    }
    Ok(1u64.checked_shl(bits - prefix).unwrap_or(u64::MAX))
}

fn pool_report(
    total: u64,
    floating_ips: u64,
    gateway_routers: u64,
    warning: u64,
    critical: u64,
) -> Report {
    let used = floating_ips + gateway_routers;
    let percentage_used = if total == 0 {
        100
    } else {
        (used as f64 / total as f64 * 100.0).round() as u64
    };
    let status = if percentage_used >= critical {
        Status::Critical
    } else if percentage_used >= warning {
        Status::Warning
    } else {
        Status::Ok
    };
    Report::new(
        status,
        format!(
            "{}% of IP pool used, {} out of {} addresses in use",
            percentage_used, used, total
        ),
    )
    .with_perf(
        PerfData::new("total_used", used)
            .warn(total * warning / 100)
            .crit(total * critical / 100)
            .max(total),
    )
    .with_perf(PerfData::new("total_available", total))
    .with_perf(PerfData::new("floating_ips_used", floating_ips))
    .with_perf(PerfData::new("ext_routers_used", gateway_routers))
}

fn check(args: &Args) -> Result<Report, ApiError> {
    if args.warning > 100 || args.critical > 100 {
        return Ok(Report::unknown("Alert parameters must be valid percentages"));
    }

    let session = Session::authenticate(&args.os)?;
    let network = NetworkClient::new(&session)?;

    // assume a single external network for now
    let networks = network.list_networks()?;
    let external = match networks.iter().find(|n| n.external) {
        Some(external) => external,
        None => return Ok(Report::critical("No external network found")),
    };

    let mut total = 0u64;
    for subnet_id in &external.subnets {
        let cidr = network.subnet_cidr(subnet_id)?;
        match address_space(&cidr) {
            Ok(size) => total += size,
            Err(err) => return Ok(Report::critical(err)),
        }
    }

    let floating_ips = network.list_floating_ips(None)?.len() as u64;
    let gateway_routers = network
        .list_routers()?
        .iter()
        .filter(|r| r.external_gateway_info.is_some())
        .count() as u64;

    Ok(pool_report(
        total,
        floating_ips,
        gateway_routers,
        args.warning,
        args.critical,
    ))
}

fn main() {
    env_logger::init();
    let args = Args::from_args();
    safe_run(|| check(&args))
}

#[cfg(test)]
mod test {
    use super::*;
    use structopt::StructOpt;

    #[test]
    fn address_space_of_common_blocks() {
        assert_eq!(address_space("192.0.2.0/24").unwrap(), 256);
        assert_eq!(address_space("192.0.2.4/32").unwrap(), 1);
        assert_eq!(address_space("10.0.0.0/8").unwrap(), 1 << 24);
        // v6 blocks saturate instead of overflowing
        assert_eq!(address_space("2001:db8::/64").unwrap(), u64::MAX);
        assert_eq!(address_space("2001:db8::/96").unwrap(), 1 << 32);
    }

    #[test]
    fn address_space_rejects_garbage() {
        assert!(address_space("192.0.2.0").is_err());
        assert!(address_space("192.0.2.0/33").is_err());
        assert!(address_space("hello/24").is_err());
    }

    #[test]
    fn twelve_of_a_slash_24_is_five_percent() {
        // 10 floating IPs + 2 gateway routers out of 256 addresses
        let report = pool_report(256, 10, 2, 80, 90);
        assert_eq!(report.status(), Status::Ok);
        assert!(report.message().starts_with("5% of IP pool used"));
        assert!(report.message().contains("12 out of 256"));
        assert!(report
            .to_line()
            .contains("total_used=12;204;230;;256"));
        assert!(report.to_line().contains("total_available=256"));
        assert!(report.to_line().contains("floating_ips_used=10"));
        assert!(report.to_line().contains("ext_routers_used=2"));
    }

    #[test]
    fn thresholds_pick_warning_and_critical() {
        assert_eq!(pool_report(100, 79, 0, 80, 90).status(), Status::Ok);
        assert_eq!(pool_report(100, 80, 0, 80, 90).status(), Status::Warning);
        assert_eq!(pool_report(100, 89, 1, 80, 90).status(), Status::Critical);
        // an empty pool counts as fully used
        assert_eq!(pool_report(0, 0, 0, 80, 90).status(), Status::Critical);
    }

    #[test]
    fn validate_argparse() {
        let args = Args::from_iter(
            [
                "check-ip-pool",
                "--os-auth-url",
                "http://keystone:5000/v3",
                "--os-username",
                "monitoring",
                "--os-password",
                "secret",
                "--os-project-name",
                "monitoring",
                "-w",
                "80",
                "-c",
                "90",
            ]
            .iter(),
        );
        assert_eq!(args.warning, 80);
        assert_eq!(args.critical, 90);
    }
}
