//! Boot, poll and delete a test instance end to end.

use std::thread::sleep;
use std::time::Duration;

use structopt::StructOpt;

use openstack_plugins::args::OpenStackArgs;
use openstack_plugins::auth::Session;
use openstack_plugins::lifecycle::{
    self, Disposable, Existing, LifecycleOptions, PurgeResult, StepError,
};
use openstack_plugins::services::{
    ApiError, ComputeApi, ComputeClient, ImageApi, ImageClient, NetworkApi, NetworkClient,
};
use openstack_plugins::{safe_run, PerfData, Report};

/// Exercise the whole instance lifecycle: resolve the image, flavor and
/// network by name, boot a test instance, wait for ACTIVE, delete it and
/// wait until it is gone.
#[derive(StructOpt, Debug)]
#[structopt(name = "check-nova-instance (part of openstack-plugins)")]
struct Args {
    #[structopt(flatten)]
    os: OpenStackArgs,

    /// Override the catalog endpoint
    #[structopt(long = "endpoint_url")]
    endpoint_url: Option<String>,

    /// Image name to boot from
    #[structopt(long = "image_name", default_value = "cirros")]
    image_name: String,

    /// Flavor name to boot with
    #[structopt(long = "flavor_name", default_value = "m1.tiny")]
    flavor_name: String,

    /// Name of the instance to create
    #[structopt(long = "instance_name", default_value = "monitoring_test")]
    instance_name: String,

    /// If matching instances are found, delete them and note it in the
    /// message instead of getting out in critical state
    #[structopt(long = "force_delete")]
    force_delete: bool,

    /// Max seconds to wait for a force-deleted pre-existing instance to
    /// disappear
    #[structopt(long = "timeout_delete", default_value = "45")]
    timeout_delete: u64,

    /// Boot the instance on this network instead of the project default
    #[structopt(long = "network")]
    network: Option<String>,

    /// Max seconds to wait for the instance to become ACTIVE, and again
    /// for it to be gone after deletion
    #[structopt(long = "timeout", default_value = "120")]
    timeout: u64,
}

struct InstanceProbe<'a, C: ComputeApi, I: ImageApi, N: NetworkApi> {
    compute: &'a C,
    image: &'a I,
    network: &'a N,
    instance_name: String,
    image_name: String,
    flavor_name: String,
    network_name: Option<String>,
    timeout_delete: u64,
    poll_interval: Duration,
    purge_count: usize,
}

impl<C: ComputeApi, I: ImageApi, N: NetworkApi> Disposable for InstanceProbe<'_, C, I, N> {
    fn kind(&self) -> &'static str {
        "instance"
    }

    fn stamp_key(&self) -> &'static str {
        "instance"
    }

    fn ready_sentinel(&self) -> Option<&'static str> {
        Some("ACTIVE")
    }

    fn list_existing(&mut self) -> Result<Vec<Existing>, StepError> {
        let servers = self
            .compute
            .list_servers()
            .map_err(|e| StepError(format!("Cannot list instances ({})", e)))?;
        Ok(servers
            .into_iter()
            .filter(|s| s.name == self.instance_name)
            .map(|s| Existing {
                id: s.id,
                label: s.name,
            })
            .collect())
    }

    /// Unlike volumes, force-deleted instances are waited on: an instance
    /// that refuses to go away within `timeout_delete` seconds is an error
    /// and gets an `undeleted_server_*` perf datum for the operator.
    fn purge_existing(&mut self, item: &Existing) -> PurgeResult {
        let mut result = PurgeResult::default();
        let count = self.purge_count;
        self.purge_count += 1;

        if let Err(err) = self.compute.delete_server(&item.id) {
            result.errors.push(format!(
                "Cannot delete the instance {} ({})",
                item.label, err
            ));
            return result;
        }

        let mut created = "unknown".to_string();
        let mut timer = 0;
        loop {
            match self.compute.server(&item.id) {
                Err(err) if err.is_not_found() => return result,
                Err(err) => {
                    result.errors.push(format!(
                        "Cannot delete the instance {} ({})",
                        item.label, err
                    ));
                    result.perfdata.push(PerfData::new(
                        format!("undeleted_server_{}_{}", item.label, count),
                        &created,
                    ));
                    return result;
                }
                Ok(server) => {
                    if !server.created.is_empty() {
                        created = server.created;
                    }
                }
            }
            if timer >= self.timeout_delete {
                result.errors.push(format!(
                    "Could not delete the instance {} within {} seconds (created at {})",
                    item.label, timer, created
                ));
                result.perfdata.push(PerfData::new(
                    format!("undeleted_server_{}_{}", item.label, count),
                    &created,
                ));
                return result;
            }
            sleep(self.poll_interval);
            timer += 1;
        }
    }

    fn create(&mut self) -> Result<String, StepError> {
        let images = self
            .image
            .find_images(&self.image_name)
            .map_err(|e| StepError(format!("Cannot find the image {} ({})", self.image_name, e)))?;
        let image = images
            .first()
            .ok_or_else(|| StepError(format!("Cannot find the image {}", self.image_name)))?;

        let flavor = self
            .compute
            .find_flavor(&self.flavor_name)
            .map_err(|e| {
                StepError(format!(
                    "Cannot find the flavor {} ({})",
                    self.flavor_name, e
                ))
            })?
            .ok_or_else(|| StepError(format!("Cannot find the flavor {}", self.flavor_name)))?;

        let network_id = match self.network_name {
            Some(ref name) => Some(
                self.network
                    .find_network(name)
                    .map_err(|e| StepError(format!("Cannot find the network {} ({})", name, e)))?
                    .ok_or_else(|| StepError(format!("Cannot find the network {}", name)))?
                    .id,
            ),
            None => None,
        };

        self.compute
            .create_server(
                &self.instance_name,
                &image.id,
                &flavor.id,
                network_id.as_deref(),
            )
            .map_err(|e| {
                StepError(format!(
                    "Cannot create the instance {} ({})",
                    self.instance_name, e
                ))
            })
    }

    fn status(&mut self, handle: &str) -> Result<Option<String>, StepError> {
        match self.compute.server(handle) {
            Ok(server) => Ok(Some(server.status)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(StepError(err.to_string())),
        }
    }

    fn delete(&mut self, handle: &str) -> Result<(), StepError> {
        self.compute
            .delete_server(handle)
            .map_err(|e| StepError(e.to_string()))
    }
}

fn check(args: &Args) -> Result<Report, ApiError> {
    let session = Session::authenticate(&args.os)?;
    let mut compute = ComputeClient::new(&session)?;

    if let Err(err) = compute.ping() {
        return Ok(Report::critical(format!("Cannot connect to nova: {}", err)));
    }
    if let Some(ref endpoint_url) = args.endpoint_url {
        if let Err(err) = compute.override_endpoint(endpoint_url) {
            return Ok(Report::unknown(err.to_string()));
        }
        if let Err(err) = compute.ping() {
            return Ok(Report::critical(format!(
                "Cannot connect to nova at {}: {}",
                compute.endpoint(),
                err
            )));
        }
    }

    let image = ImageClient::new(&session)?;
    let network = NetworkClient::new(&session)?;

    let mut probe = InstanceProbe {
        compute: &compute,
        image: &image,
        network: &network,
        instance_name: args.instance_name.clone(),
        image_name: args.image_name.clone(),
        flavor_name: args.flavor_name.clone(),
        network_name: args.network.clone(),
        timeout_delete: args.timeout_delete,
        poll_interval: Duration::from_secs(1),
        purge_count: 0,
    };
    let opts = LifecycleOptions {
        force_delete: args.force_delete,
        timeout: args.timeout,
        poll_interval: Duration::from_secs(1),
    };
    Ok(lifecycle::run(&mut probe, &opts))
}

fn main() {
    env_logger::init();
    let args = Args::from_args();
    safe_run(|| check(&args))
}

#[cfg(test)]
mod test {
    use super::*;
    use openstack_plugins::services::compute::Flavor;
    use openstack_plugins::services::network::NetworkSummary;
    use openstack_plugins::services::{Image, Server};
    use openstack_plugins::Status;
    use std::cell::{Cell, RefCell};
    use structopt::StructOpt;

    struct MockCompute {
        servers: Vec<Server>,
        flavors: Vec<Flavor>,
        create_calls: Cell<usize>,
        deleted: RefCell<Vec<String>>,
    }

    impl ComputeApi for MockCompute {
        fn ping(&self) -> Result<(), ApiError> {
            Ok(())
        }

        fn list_flavors(&self) -> Result<Vec<Flavor>, ApiError> {
            Ok(self.flavors.clone())
        }

        fn find_flavor(&self, name: &str) -> Result<Option<Flavor>, ApiError> {
            Ok(self.flavors.iter().find(|f| f.name == name).cloned())
        }

        fn list_servers(&self) -> Result<Vec<Server>, ApiError> {
            Ok(self.servers.clone())
        }

        fn server(&self, id: &str) -> Result<Server, ApiError> {
            if self.deleted.borrow().iter().any(|deleted| deleted == id) {
                return Err(ApiError::NotFound);
            }
            Ok(Server {
                id: id.to_string(),
                name: "monitoring_test".to_string(),
                status: "ACTIVE".to_string(),
                created: "2015-08-14T14:05:23Z".to_string(),
            })
        }

        fn create_server(
            &self,
            _name: &str,
            _image_id: &str,
            _flavor_id: &str,
            _network_id: Option<&str>,
        ) -> Result<String, ApiError> {
            self.create_calls.set(self.create_calls.get() + 1);
            Ok("srv-1".to_string())
        }

        fn delete_server(&self, id: &str) -> Result<(), ApiError> {
            self.deleted.borrow_mut().push(id.to_string());
            Ok(())
        }
    }

    struct MockImage {
        images: Vec<Image>,
    }

    impl ImageApi for MockImage {
        fn list_images(&self, _limit: usize) -> Result<Vec<Image>, ApiError> {
            Ok(self.images.clone())
        }

        fn find_images(&self, name: &str) -> Result<Vec<Image>, ApiError> {
            Ok(self
                .images
                .iter()
                .filter(|i| i.name.as_deref() == Some(name))
                .cloned()
                .collect())
        }
    }

    struct MockNetwork;

    impl NetworkApi for MockNetwork {
        fn ping(&self) -> Result<(), ApiError> {
            Ok(())
        }

        fn list_networks(&self) -> Result<Vec<NetworkSummary>, ApiError> {
            Ok(vec![])
        }

        fn find_network(&self, _name: &str) -> Result<Option<NetworkSummary>, ApiError> {
            Ok(None)
        }

        fn subnet_cidr(&self, _id: &str) -> Result<String, ApiError> {
            Err(ApiError::NotFound)
        }

        fn list_floating_ips(
            &self,
            _project_id: Option<&str>,
        ) -> Result<Vec<openstack_plugins::services::FloatingIp>, ApiError> {
            Ok(vec![])
        }

        fn create_floating_ip(
            &self,
            _network_id: &str,
        ) -> Result<openstack_plugins::services::FloatingIp, ApiError> {
            Err(ApiError::NotFound)
        }

        fn floating_ip(
            &self,
            _id: &str,
        ) -> Result<openstack_plugins::services::FloatingIp, ApiError> {
            Err(ApiError::NotFound)
        }

        fn delete_floating_ip(&self, _id: &str) -> Result<(), ApiError> {
            Ok(())
        }

        fn list_routers(
            &self,
        ) -> Result<Vec<openstack_plugins::services::Router>, ApiError> {
            Ok(vec![])
        }
    }

    fn mock_compute() -> MockCompute {
        MockCompute {
            servers: vec![],
            flavors: vec![Flavor {
                id: "1".to_string(),
                name: "m1.tiny".to_string(),
            }],
            create_calls: Cell::new(0),
            deleted: RefCell::new(vec![]),
        }
    }

    fn mock_image() -> MockImage {
        MockImage {
            images: vec![Image {
                id: "img-1".to_string(),
                name: Some("cirros".to_string()),
                status: Some("active".to_string()),
            }],
        }
    }

    fn probe<'a>(
        compute: &'a MockCompute,
        image: &'a MockImage,
        network: &'a MockNetwork,
    ) -> InstanceProbe<'a, MockCompute, MockImage, MockNetwork> {
        InstanceProbe {
            compute,
            image,
            network,
            instance_name: "monitoring_test".to_string(),
            image_name: "cirros".to_string(),
            flavor_name: "m1.tiny".to_string(),
            network_name: None,
            timeout_delete: 3,
            poll_interval: Duration::from_secs(0),
            purge_count: 0,
        }
    }

    fn fast_opts(force_delete: bool) -> LifecycleOptions {
        LifecycleOptions {
            force_delete,
            timeout: 5,
            poll_interval: Duration::from_secs(0),
        }
    }

    #[test]
    fn happy_path_boots_and_deletes_an_instance() {
        let compute = mock_compute();
        let image = mock_image();
        let network = MockNetwork;
        let mut target = probe(&compute, &image, &network);
        let report = lifecycle::run(&mut target, &fast_opts(false));
        assert_eq!(report.status(), Status::Ok);
        assert_eq!(compute.create_calls.get(), 1);
        assert_eq!(compute.deleted.borrow().len(), 1);
    }

    #[test]
    fn leftover_instance_blocks_creation() {
        let mut compute = mock_compute();
        compute.servers = vec![Server {
            id: "old-1".to_string(),
            name: "monitoring_test".to_string(),
            status: "ACTIVE".to_string(),
            created: "2015-08-14T14:05:23Z".to_string(),
        }];
        let image = mock_image();
        let network = MockNetwork;
        let mut target = probe(&compute, &image, &network);
        let report = lifecycle::run(&mut target, &fast_opts(false));
        assert_eq!(report.status(), Status::Critical);
        assert!(report.message().contains("Won't create a test instance"));
        assert_eq!(compute.create_calls.get(), 0);
    }

    #[test]
    fn missing_image_stops_before_any_boot() {
        let compute = mock_compute();
        let image = MockImage { images: vec![] };
        let network = MockNetwork;
        let mut target = probe(&compute, &image, &network);
        let report = lifecycle::run(&mut target, &fast_opts(false));
        assert_eq!(report.status(), Status::Critical);
        assert!(report.message().contains("Cannot find the image cirros"));
        assert_eq!(compute.create_calls.get(), 0);
        assert!(compute.deleted.borrow().is_empty());
    }

    #[test]
    fn missing_network_stops_before_any_boot() {
        let compute = mock_compute();
        let image = mock_image();
        let network = MockNetwork;
        let mut target = probe(&compute, &image, &network);
        target.network_name = Some("private".to_string());
        let report = lifecycle::run(&mut target, &fast_opts(false));
        assert_eq!(report.status(), Status::Critical);
        assert!(report.message().contains("Cannot find the network private"));
        assert_eq!(compute.create_calls.get(), 0);
    }

    #[test]
    fn validate_argparse() {
        let args = Args::from_iter(
            [
                "check-nova-instance",
                "--os-auth-url",
                "http://keystone:5000/v3",
                "--os-username",
                "monitoring",
                "--os-password",
                "secret",
                "--os-project-name",
                "monitoring",
                "--image_name",
                "cirros-0.5",
                "--timeout_delete",
                "30",
            ]
            .iter(),
        );
        assert_eq!(args.image_name, "cirros-0.5");
        assert_eq!(args.flavor_name, "m1.tiny");
        assert_eq!(args.instance_name, "monitoring_test");
        assert_eq!(args.timeout_delete, 30);
    }
}
