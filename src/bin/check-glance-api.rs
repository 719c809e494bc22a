//! Check the Glance API by timing an image list.

use std::time::Instant;

use structopt::StructOpt;

use openstack_plugins::args::{LatencyThresholds, OpenStackArgs};
use openstack_plugins::auth::Session;
use openstack_plugins::services::{ApiError, Image, ImageApi, ImageClient};
use openstack_plugins::{safe_run, PerfData, Report};

/// Time an image list against the Glance API.
#[derive(StructOpt, Debug)]
#[structopt(name = "check-glance-api (part of openstack-plugins)")]
struct Args {
    #[structopt(flatten)]
    os: OpenStackArgs,
    #[structopt(flatten)]
    thresholds: LatencyThresholds,
}

fn check(args: &Args) -> Result<Report, ApiError> {
    let session = Session::authenticate(&args.os)?;
    let image = ImageClient::new(&session)?;

    let start = Instant::now();
    let images = match image.list_images(25) {
        Ok(images) => images,
        Err(err) => return Ok(Report::critical(err.to_string())),
    };
    let elapsed = start.elapsed().as_secs();

    Ok(evaluate_gated(
        &images,
        elapsed,
        args.thresholds.warning,
        args.thresholds.critical,
    ))
}

// TODO: an empty image list skips the threshold comparison entirely and
// reports OK no matter how slow the call was. Decide whether that gating is
// intended before changing it.
fn evaluate_gated(images: &[Image], elapsed: u64, warning: u64, critical: u64) -> Report {
    let perf = PerfData::new("response_time", elapsed);
    if !images.is_empty() && elapsed > critical {
        Report::critical(format!(
            "Get images took more than {} seconds, it's too long.",
            critical
        ))
        .with_perf(perf)
    } else if !images.is_empty() && elapsed > warning {
        Report::warning(format!(
            "Get images took more than {} seconds, it's too long.",
            warning
        ))
        .with_perf(perf)
    } else {
        Report::ok(format!(
            "Get images, glance API is working: list {} images in {} seconds.",
            images.len(),
            elapsed
        ))
        .with_perf(perf)
    }
}

fn main() {
    env_logger::init();
    let args = Args::from_args();
    safe_run(|| check(&args))
}
