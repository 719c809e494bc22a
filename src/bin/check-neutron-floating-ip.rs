//! Allocate and release a floating IP in the external network.

use std::time::Duration;

use log::warn;
use regex::Regex;
use structopt::StructOpt;

use openstack_plugins::args::OpenStackArgs;
use openstack_plugins::auth::Session;
use openstack_plugins::lifecycle::{
    self, Disposable, Existing, LifecycleOptions, PurgeResult, StepError,
};
use openstack_plugins::services::{ApiError, NetworkApi, NetworkClient};
use openstack_plugins::{safe_run, Report};

/// Allocate a floating IP in the external network, then release it.
///
/// Floating IPs are usable as soon as the create call returns, so unlike
/// the volume and instance checks there is no ready/gone polling.
#[derive(StructOpt, Debug)]
#[structopt(name = "check-neutron-floating-ip (part of openstack-plugins)")]
struct Args {
    #[structopt(flatten)]
    os: OpenStackArgs,

    /// Override the catalog endpoint
    #[structopt(long = "endpoint_url")]
    endpoint_url: Option<String>,

    /// If matching floating ips are found, delete them and note it in the
    /// message instead of getting out in critical state
    #[structopt(long = "force_delete")]
    force_delete: bool,

    /// Regex of IP(s) to check for existence, or "all" to match every ip.
    /// Without this flag no pre-existing floating ip is ever touched.
    #[structopt(long = "floating_ip", parse(try_from_str = parse_matcher))]
    floating_ip: Option<IpMatcher>,

    /// Name of the "public" external network
    #[structopt(long = "ext_network_name", default_value = "public")]
    ext_network_name: String,
}

#[derive(Debug, Clone)]
enum IpMatcher {
    All,
    Pattern(Regex),
}

impl IpMatcher {
    fn matches(&self, address: &str) -> bool {
        match self {
            IpMatcher::All => true,
            IpMatcher::Pattern(re) => re.is_match(address),
        }
    }
}

fn parse_matcher(raw: &str) -> Result<IpMatcher, regex::Error> {
    if raw == "all" {
        Ok(IpMatcher::All)
    } else {
        Regex::new(raw).map(IpMatcher::Pattern)
    }
}

struct FloatingIpProbe<'a, A: NetworkApi> {
    api: &'a A,
    matcher: Option<IpMatcher>,
    ext_network_name: String,
    project_id: String,
    created_address: Option<String>,
}

impl<A: NetworkApi> Disposable for FloatingIpProbe<'_, A> {
    fn kind(&self) -> &'static str {
        "floating ip"
    }

    fn stamp_key(&self) -> &'static str {
        "floatingip"
    }

    fn ready_sentinel(&self) -> Option<&'static str> {
        None
    }

    fn list_existing(&mut self) -> Result<Vec<Existing>, StepError> {
        let matcher = match self.matcher {
            Some(ref matcher) => matcher,
            None => return Ok(vec![]),
        };
        let ips = self
            .api
            .list_floating_ips(Some(&self.project_id))
            .map_err(|e| StepError(format!("Cannot list floating ips ({})", e)))?;
        Ok(ips
            .into_iter()
            .filter(|ip| matcher.matches(&ip.floating_ip_address))
            .map(|ip| Existing {
                id: ip.id,
                label: ip.floating_ip_address,
            })
            .collect())
    }

    fn purge_existing(&mut self, item: &Existing) -> PurgeResult {
        // asynchronous: we do not wait for or verify the deletion
        if let Err(err) = self.api.delete_floating_ip(&item.id) {
            warn!("could not delete leftover floating ip {}: {}", item.label, err);
        }
        PurgeResult::default()
    }

    fn create(&mut self) -> Result<String, StepError> {
        let network = self
            .api
            .find_network(&self.ext_network_name)
            .map_err(|e| {
                StepError(format!(
                    "Cannot find ext network named '{}' ({})",
                    self.ext_network_name, e
                ))
            })?
            .ok_or_else(|| {
                StepError(format!(
                    "Cannot find ext network named '{}'",
                    self.ext_network_name
                ))
            })?;
        let ip = self
            .api
            .create_floating_ip(&network.id)
            .map_err(|e| StepError(format!("Cannot create a floating ip: {}", e)))?;
        self.created_address = Some(ip.floating_ip_address);
        Ok(ip.id)
    }

    fn status(&mut self, handle: &str) -> Result<Option<String>, StepError> {
        match self.api.floating_ip(handle) {
            Ok(ip) => Ok(Some(ip.status.unwrap_or_else(|| "ACTIVE".to_string()))),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(StepError(err.to_string())),
        }
    }

    fn delete(&mut self, handle: &str) -> Result<(), StepError> {
        self.api
            .delete_floating_ip(handle)
            .map_err(|e| StepError(e.to_string()))
    }

    fn created_note(&self, _handle: &str) -> Option<String> {
        self.created_address
            .as_ref()
            .map(|address| format!("fip={}", address))
    }
}

fn check(args: &Args) -> Result<Report, ApiError> {
    let session = Session::authenticate(&args.os)?;
    let mut api = NetworkClient::new(&session)?;

    if let Err(err) = api.ping() {
        return Ok(Report::critical(format!(
            "Cannot connect to neutron: {}",
            err
        )));
    }
    if let Some(ref endpoint_url) = args.endpoint_url {
        if let Err(err) = api.override_endpoint(endpoint_url) {
            return Ok(Report::unknown(err.to_string()));
        }
        if let Err(err) = api.ping() {
            return Ok(Report::critical(format!(
                "Cannot connect to neutron at {}: {}",
                api.endpoint(),
                err
            )));
        }
    }

    let mut probe = FloatingIpProbe {
        api: &api,
        matcher: args.floating_ip.clone(),
        ext_network_name: args.ext_network_name.clone(),
        project_id: session.project_id().to_string(),
        created_address: None,
    };
    let opts = LifecycleOptions {
        force_delete: args.force_delete,
        timeout: 120,
        poll_interval: Duration::from_secs(1),
    };
    Ok(lifecycle::run(&mut probe, &opts))
}

fn main() {
    env_logger::init();
    let args = Args::from_args();
    safe_run(|| check(&args))
}
