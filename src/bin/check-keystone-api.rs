//! Check the Keystone API by timing a token issue.

use std::time::Instant;

use structopt::StructOpt;

use openstack_plugins::args::OpenStackArgs;
use openstack_plugins::auth::Session;
use openstack_plugins::services::ApiError;
use openstack_plugins::{safe_run, PerfData, Report};

/// Time issuing a token against the Keystone API.
///
/// Authenticating is the whole check here, so a failure to get a token is
/// CRITICAL and there is only a warning threshold for slowness.
#[derive(StructOpt, Debug)]
#[structopt(name = "check-keystone-api (part of openstack-plugins)")]
struct Args {
    #[structopt(flatten)]
    os: OpenStackArgs,

    /// Warning threshold in seconds for getting a token
    #[structopt(short = "w", long = "warning", default_value = "10")]
    warning: u64,
}

fn check(args: &Args) -> Result<Report, ApiError> {
    let start = Instant::now();
    if let Err(err) = Session::authenticate(&args.os) {
        return Ok(Report::critical(format!("Unable to get a token: {}", err)));
    }
    let elapsed = start.elapsed().as_secs();

    let perf = PerfData::new("response_time", elapsed);
    if elapsed > args.warning {
        Ok(Report::warning(format!(
            "Got a token after {} seconds, it's too long.",
            elapsed
        ))
        .with_perf(perf))
    } else {
        Ok(Report::ok("Got a token, Keystone API is working.").with_perf(perf))
    }
}

fn main() {
    env_logger::init();
    let args = Args::from_args();
    safe_run(|| check(&args))
}

#[cfg(test)]
mod test {
    use super::Args;
    use structopt::StructOpt;

    #[test]
    fn validate_argparse() {
        let args = Args::from_iter(
            [
                "check-keystone-api",
                "--os-auth-url",
                "http://keystone:5000/v3",
                "--os-username",
                "monitoring",
                "--os-password",
                "secret",
                "--os-project-name",
                "monitoring",
                "-w",
                "15",
            ]
            .iter(),
        );
        assert_eq!(args.warning, 15);
    }
}
