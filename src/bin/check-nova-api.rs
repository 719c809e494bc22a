//! Check the Nova API by timing a flavor list.

use std::time::Instant;

use structopt::StructOpt;

use openstack_plugins::args::{LatencyThresholds, OpenStackArgs};
use openstack_plugins::auth::Session;
use openstack_plugins::services::{ApiError, ComputeApi, ComputeClient};
use openstack_plugins::{evaluate_latency, safe_run, Report};

/// Time a flavor list against the Nova API.
#[derive(StructOpt, Debug)]
#[structopt(name = "check-nova-api (part of openstack-plugins)")]
struct Args {
    #[structopt(flatten)]
    os: OpenStackArgs,
    #[structopt(flatten)]
    thresholds: LatencyThresholds,
}

fn check(args: &Args) -> Result<Report, ApiError> {
    let session = Session::authenticate(&args.os)?;
    let compute = ComputeClient::new(&session)?;

    let start = Instant::now();
    let flavors = match compute.list_flavors() {
        Ok(flavors) => flavors,
        Err(err) => return Ok(Report::critical(err.to_string())),
    };
    let elapsed = start.elapsed().as_secs();

    Ok(evaluate_latency(
        elapsed,
        args.thresholds.warning,
        args.thresholds.critical,
        "Get flavors",
        format!(
            "Get flavors, nova API is working: list {} flavors in {} seconds.",
            flavors.len(),
            elapsed
        ),
    ))
}

fn main() {
    env_logger::init();
    let args = Args::from_args();
    safe_run(|| check(&args))
}
