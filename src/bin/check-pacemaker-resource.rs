//! Check where a pacemaker resource is running.

use std::ffi::CString;
use std::io;
use std::path::Path;
use std::process::Command;

use structopt::StructOpt;

use openstack_plugins::pacemaker::{locate_resource, ResourceLocation};
use openstack_plugins::{safe_run, Report};

/// Check that a pacemaker resource is started, and whether it runs on this
/// node. When it runs here and a script is given, the script replaces this
/// process and its exit code becomes the check result.
#[derive(StructOpt, Debug)]
#[structopt(name = "check-pacemaker-resource (part of openstack-plugins)")]
struct Args {
    /// Pacemaker resource name
    #[structopt(short = "r", long = "resource")]
    resource: String,

    /// Script to exec when the resource is started on this node
    #[structopt(short = "s", long = "script")]
    script: Option<String>,

    /// Use "crm_mon -1" instead of "pcs status"
    #[structopt(long = "crm")]
    crm: bool,
}

fn check(args: &Args) -> Result<Report, io::Error> {
    if let Some(ref script) = args.script {
        let command_path = script.split_whitespace().next().unwrap_or(script);
        if !Path::new(command_path).is_file() {
            return Ok(Report::unknown(format!(
                "the script {} could not be read",
                command_path
            )));
        }
    }

    let local_hostname = match Command::new("hostname").arg("-s").output() {
        Ok(out) if out.status.success() => {
            String::from_utf8_lossy(&out.stdout).trim().to_string()
        }
        Ok(out) => {
            return Ok(Report::critical(format!(
                "hostname -s failed with {}",
                out.status
            )))
        }
        Err(err) => return Ok(Report::critical(format!("cannot run hostname -s: {}", err))),
    };

    let (command, command_args): (&str, &[&str]) = if args.crm {
        ("crm_mon", &["-1"])
    } else {
        ("pcs", &["status"])
    };
    let output = match Command::new(command).args(command_args).output() {
        Ok(output) => output,
        Err(ref err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(Report::critical(format!("{} not found", command)))
        }
        Err(err) => return Ok(Report::critical(format!("cannot run {}: {}", command, err))),
    };
    if !output.status.success() {
        return Ok(Report::critical(format!(
            "{} {} returned {}: {}",
            command,
            command_args.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let status_text = String::from_utf8_lossy(&output.stdout);
    match locate_resource(&status_text, &args.resource, &local_hostname) {
        ResourceLocation::LocalStarted => match args.script {
            Some(ref script) => {
                // exec_script only returns when the exec itself failed
                let err = exec_script(script);
                Ok(Report::critical(format!("cannot exec {}: {}", script, err)))
            }
            None => Ok(Report::ok(format!(
                "pacemaker resource {} is running",
                args.resource
            ))),
        },
        ResourceLocation::RemoteStarted(host) => Ok(Report::ok(format!(
            "pacemaker resource {} is not running on this node (but on {})",
            args.resource, host
        ))),
        ResourceLocation::NotStarted(status) => Ok(Report::critical(format!(
            "pacemaker resource {} is not started ({})",
            args.resource, status
        ))),
        ResourceLocation::Absent => Ok(Report::critical(format!(
            "pacemaker resource {} not found",
            args.resource
        ))),
    }
}

/// Replace the current process with the given command line. On success this
/// never returns; the error text is returned otherwise.
fn exec_script(script: &str) -> String {
    let words: Vec<CString> = script
        .split_whitespace()
        .filter_map(|word| CString::new(word).ok())
        .collect();
    if words.is_empty() {
        return "empty script command".to_string();
    }
    match nix::unistd::execvp(&words[0], &words) {
        Err(err) => err.to_string(),
        Ok(never) => match never {},
    }
}

fn main() {
    env_logger::init();
    let args = Args::from_args();
    safe_run(|| check(&args))
}
