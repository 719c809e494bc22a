//! Check that Glance holds enough images, or specific ones.

use structopt::StructOpt;

use openstack_plugins::args::OpenStackArgs;
use openstack_plugins::auth::Session;
use openstack_plugins::services::{ApiError, ImageApi, ImageClient};
use openstack_plugins::{safe_run, Report};

/// Verify a minimum number of images and/or that specific images resolve
/// by name. With no flags this degrades to a connectivity check.
#[derive(StructOpt, Debug)]
#[structopt(name = "check-glance-image-exists (part of openstack-plugins)")]
struct Args {
    #[structopt(flatten)]
    os: OpenStackArgs,

    /// Minimum number of images that must exist
    #[structopt(long = "req_count")]
    req_count: Option<usize>,

    /// Names of images that must each resolve to exactly one image
    #[structopt(long = "req_images")]
    req_images: Vec<String>,
}

fn verdict(
    count: usize,
    req_count: Option<usize>,
    valid: usize,
    req_images: &[String],
) -> Report {
    if let Some(required) = req_count {
        if count < required {
            return Report::critical(format!(
                "Failed - less than {} images found ({})",
                required, count
            ));
        }
    }
    if !req_images.is_empty() && valid < req_images.len() {
        return Report::critical(format!(
            "Failed - '{}' {}/{} images found",
            req_images.join(", "),
            valid,
            req_images.len()
        ));
    }
    match (req_images.is_empty(), req_count) {
        (false, Some(required)) => Report::ok(format!(
            "image {} found and enough images >= {}",
            req_images.join(", "),
            required
        )),
        (false, None) => Report::ok(format!("image {} found", req_images.join(", "))),
        (true, Some(_)) => Report::ok(format!("more than {} images found", count)),
        (true, None) => Report::ok("Connection to glance established"),
    }
}

fn check(args: &Args) -> Result<Report, ApiError> {
    let session = Session::authenticate(&args.os)?;
    let image = ImageClient::new(&session)?;

    let count = image.list_images(args.req_count.unwrap_or(1))?.len();
    let mut valid = 0;
    for name in &args.req_images {
        if let Ok(found) = image.find_images(name) {
            if found.len() == 1 {
                valid += 1;
            }
        }
    }
    Ok(verdict(count, args.req_count, valid, &args.req_images))
}

fn main() {
    env_logger::init();
    let args = Args::from_args();
    safe_run(|| check(&args))
}
