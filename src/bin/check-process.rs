//! Check that an OpenStack service process is running.

use structopt::StructOpt;

use openstack_plugins::procfs::{running_processes, ProcFsError};
use openstack_plugins::{safe_run, Report};

/// Check that a process with the given name is running.
///
/// The name matches the kernel's (possibly truncated) process name or the
/// basename of the first two command line words, so interpreter-invoked
/// services like `python /usr/bin/nova-api` are found too.
#[derive(StructOpt, Debug)]
#[structopt(name = "check-process (part of openstack-plugins)")]
struct Args {
    #[structopt(help = "Process name to look for")]
    process_name: String,
}

fn check(args: &Args) -> Result<Report, ProcFsError> {
    let processes = running_processes()?;
    if processes.iter().any(|p| p.matches_name(&args.process_name)) {
        Ok(Report::ok(format!("{} is working.", args.process_name)))
    } else {
        Ok(Report::critical(format!(
            "{} is not running",
            args.process_name
        )))
    }
}

fn main() {
    env_logger::init();
    let args = Args::from_args();
    safe_run(|| check(&args))
}
