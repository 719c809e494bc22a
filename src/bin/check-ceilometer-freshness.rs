//! Check that Ceilometer is still recording samples.

use chrono::{DateTime, Duration, Utc};
use structopt::StructOpt;

use openstack_plugins::args::OpenStackArgs;
use openstack_plugins::auth::Session;
use openstack_plugins::services::{ApiError, TelemetryApi, TelemetryClient};
use openstack_plugins::{safe_run, PerfData, Report};

/// Alert when the newest sample of a meter is older than the thresholds.
#[derive(StructOpt, Debug)]
#[structopt(name = "check-ceilometer-freshness (part of openstack-plugins)")]
struct Args {
    #[structopt(flatten)]
    os: OpenStackArgs,

    /// Warning threshold in minutes since the last sample
    #[structopt(short = "w", long = "warning")]
    warning: i64,

    /// Critical threshold in minutes since the last sample
    #[structopt(short = "c", long = "critical")]
    critical: i64,

    /// Meter whose freshness is checked
    #[structopt(long = "meter", default_value = "cpu")]
    meter: String,
}

fn evaluate_freshness(
    sample: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    warning: i64,
    critical: i64,
) -> Report {
    let recorded_at = match sample {
        Some(recorded_at) => recorded_at,
        None => return Report::unknown("Ceilometer is not returning any sample"),
    };
    let age = now.signed_duration_since(recorded_at);
    let minutes = age.num_minutes();
    let perf = PerfData::new("age_minutes", minutes).warn(warning).crit(critical);
    if age >= Duration::minutes(critical) {
        Report::critical(format!(
            "Ceilometer data is behind by {} minute(s), last sample recorded at {}",
            minutes, recorded_at
        ))
        .with_perf(perf)
    } else if age >= Duration::minutes(warning) {
        Report::warning(format!(
            "Ceilometer data is behind by {} minute(s), last sample recorded at {}",
            minutes, recorded_at
        ))
        .with_perf(perf)
    } else {
        Report::ok(format!(
            "Ceilometer data is updating, last sample recorded at {}",
            recorded_at
        ))
        .with_perf(perf)
    }
}

fn check(args: &Args) -> Result<Report, ApiError> {
    let session = Session::authenticate(&args.os)?;
    let telemetry = TelemetryClient::new(&session)?;
    let sample = telemetry.latest_sample(&args.meter)?;
    Ok(evaluate_freshness(
        sample,
        Utc::now(),
        args.warning,
        args.critical,
    ))
}

fn main() {
    env_logger::init();
    let args = Args::from_args();
    safe_run(|| check(&args))
}
