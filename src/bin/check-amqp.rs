//! Check that an OpenStack service is connected to its message broker.

use std::collections::HashSet;

use structopt::StructOpt;

use openstack_plugins::procfs::{
    running_processes, tcp_connections, ProcFsError, TcpConnection, AMQP_PORT,
};
use openstack_plugins::{safe_run, Report};

/// Check that a process is running and holds at least one established TCP
/// connection to the AMQP port (5672).
#[derive(StructOpt, Debug)]
#[structopt(name = "check-amqp (part of openstack-plugins)")]
struct Args {
    #[structopt(help = "Process name to look for")]
    process_name: String,
}

/// The socket inodes of every established connection to the AMQP port.
fn amqp_inodes(connections: &[TcpConnection]) -> HashSet<u64> {
    connections
        .iter()
        .filter(|c| c.established && c.remote_port == AMQP_PORT)
        .map(|c| c.inode)
        .collect()
}

fn check(args: &Args) -> Result<Report, ProcFsError> {
    let name = &args.process_name;
    let matching: Vec<_> = running_processes()?
        .into_iter()
        .filter(|p| p.matches_name(name))
        .collect();
    if matching.is_empty() {
        return Ok(Report::critical(format!("{} is not running", name)));
    }

    let amqp = amqp_inodes(&tcp_connections()?);
    for process in &matching {
        let inodes = match process.socket_inodes() {
            Ok(inodes) => inodes,
            // the process went away between the two scans
            Err(_) => continue,
        };
        if inodes.iter().any(|inode| amqp.contains(inode)) {
            return Ok(Report::ok(format!("{} is working.", name)));
        }
    }
    Ok(Report::critical(format!(
        "{} is not connected to AMQP",
        name
    )))
}

fn main() {
    env_logger::init();
    let args = Args::from_args();
    safe_run(|| check(&args))
}
