//! Check the Cinder API by timing a quota-set read.

use std::time::Instant;

use structopt::StructOpt;

use openstack_plugins::args::{LatencyThresholds, OpenStackArgs};
use openstack_plugins::auth::Session;
use openstack_plugins::services::{ApiError, VolumeApi, VolumeClient};
use openstack_plugins::{evaluate_latency, safe_run, Report};

/// Time a quota-set read against the Cinder API.
#[derive(StructOpt, Debug)]
#[structopt(name = "check-cinder-api (part of openstack-plugins)")]
struct Args {
    #[structopt(flatten)]
    os: OpenStackArgs,
    #[structopt(flatten)]
    thresholds: LatencyThresholds,
}

fn check(args: &Args) -> Result<Report, ApiError> {
    let session = Session::authenticate(&args.os)?;
    let volume = VolumeClient::new(&session)?;

    let start = Instant::now();
    if let Err(err) = volume.quota_set(session.project_id()) {
        return Ok(Report::critical(err.to_string()));
    }
    let elapsed = start.elapsed().as_secs();

    Ok(evaluate_latency(
        elapsed,
        args.thresholds.warning,
        args.thresholds.critical,
        "Get quotas",
        format!(
            "Get quotas, cinder API is working: list quota in {} seconds.",
            elapsed
        ),
    ))
}

fn main() {
    env_logger::init();
    let args = Args::from_args();
    safe_run(|| check(&args))
}
