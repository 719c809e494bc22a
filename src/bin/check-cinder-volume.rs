//! Create, poll and delete a test volume end to end.

use std::time::Duration;

use log::warn;
use structopt::StructOpt;

use openstack_plugins::args::OpenStackArgs;
use openstack_plugins::auth::Session;
use openstack_plugins::lifecycle::{
    self, Disposable, Existing, LifecycleOptions, PurgeResult, StepError,
};
use openstack_plugins::services::{ApiError, VolumeApi, VolumeClient, VolumeSpec};
use openstack_plugins::{safe_run, Report};

/// Exercise the whole volume lifecycle: create a test volume, wait for it
/// to become available, delete it and wait until it is gone.
#[derive(StructOpt, Debug)]
#[structopt(name = "check-cinder-volume (part of openstack-plugins)")]
struct Args {
    #[structopt(flatten)]
    os: OpenStackArgs,

    /// Override the catalog endpoint
    #[structopt(long = "endpoint_url")]
    endpoint_url: Option<String>,

    /// If matching volumes are found, delete them and note it in the
    /// message instead of getting out in critical state
    #[structopt(long = "force_delete")]
    force_delete: bool,

    /// Name of the volume to create
    #[structopt(long = "volume_name", default_value = "monitoring_test")]
    volume_name: String,

    /// Size of the volume to create, in GB
    #[structopt(long = "volume_size", default_value = "1")]
    volume_size: u64,

    /// With multiple backends, choose the volume type
    #[structopt(long = "volume_type")]
    volume_type: Option<String>,

    /// Create the volume in this availability zone
    #[structopt(long = "availability_zone")]
    availability_zone: Option<String>,

    /// Max seconds to wait for the volume to become available, and again
    /// for it to be gone after deletion
    #[structopt(long = "timeout", default_value = "120")]
    timeout: u64,
}

struct VolumeProbe<'a, A: VolumeApi> {
    api: &'a A,
    spec: VolumeSpec,
}

impl<A: VolumeApi> Disposable for VolumeProbe<'_, A> {
    fn kind(&self) -> &'static str {
        "volume"
    }

    fn stamp_key(&self) -> &'static str {
        "volume"
    }

    fn ready_sentinel(&self) -> Option<&'static str> {
        Some("available")
    }

    fn list_existing(&mut self) -> Result<Vec<Existing>, StepError> {
        let volumes = self
            .api
            .list_volumes()
            .map_err(|e| StepError(format!("Cannot list volumes ({})", e)))?;
        Ok(volumes
            .into_iter()
            .filter(|v| v.name.as_deref() == Some(self.spec.name.as_str()))
            .map(|v| Existing {
                id: v.id,
                label: self.spec.name.clone(),
            })
            .collect())
    }

    fn purge_existing(&mut self, item: &Existing) -> PurgeResult {
        // asynchronous: we do not wait for or verify the deletion
        if let Err(err) = self.api.delete_volume(&item.id) {
            warn!("could not delete leftover volume {}: {}", item.id, err);
        }
        PurgeResult::default()
    }

    fn create(&mut self) -> Result<String, StepError> {
        self.api
            .create_volume(&self.spec)
            .map_err(|e| StepError(format!("Cannot create the volume {} ({})", self.spec.name, e)))
    }

    fn status(&mut self, handle: &str) -> Result<Option<String>, StepError> {
        match self.api.volume_status(handle) {
            Ok(status) => Ok(Some(status)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(StepError(err.to_string())),
        }
    }

    fn delete(&mut self, handle: &str) -> Result<(), StepError> {
        self.api
            .delete_volume(handle)
            .map_err(|e| StepError(e.to_string()))
    }
}

fn check(args: &Args) -> Result<Report, ApiError> {
    let session = Session::authenticate(&args.os)?;
    let mut api = VolumeClient::new(&session)?;

    if let Err(err) = api.ping() {
        return Ok(Report::critical(format!("Cannot connect to cinder: {}", err)));
    }
    if let Some(ref endpoint_url) = args.endpoint_url {
        if let Err(err) = api.override_endpoint(endpoint_url) {
            return Ok(Report::unknown(err.to_string()));
        }
        // the merged endpoint has to answer too before we create anything
        if let Err(err) = api.ping() {
            return Ok(Report::critical(format!(
                "Cannot connect to cinder at {}: {}",
                api.endpoint(),
                err
            )));
        }
    }

    let mut probe = VolumeProbe {
        api: &api,
        spec: VolumeSpec {
            name: args.volume_name.clone(),
            size_gb: args.volume_size,
            volume_type: args.volume_type.clone(),
            availability_zone: args.availability_zone.clone(),
        },
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
    use openstack_plugins::services::VolumeSummary;
    use openstack_plugins::Status;
    use std::cell::{Cell, RefCell};
    use structopt::StructOpt;

    struct MockVolumeApi {
        volumes: Vec<VolumeSummary>,
        create_calls: Cell<usize>,
        deleted: RefCell<Vec<String>>,
    }

    impl MockVolumeApi {
        fn empty() -> MockVolumeApi {
            MockVolumeApi {
                volumes: vec![],
                create_calls: Cell::new(0),
                deleted: RefCell::new(vec![]),
            }
        }
    }

    impl VolumeApi for MockVolumeApi {
        fn ping(&self) -> Result<(), ApiError> {
            Ok(())
        }

        fn list_volumes(&self) -> Result<Vec<VolumeSummary>, ApiError> {
            Ok(self.volumes.clone())
        }

        fn create_volume(&self, _spec: &VolumeSpec) -> Result<String, ApiError> {
            self.create_calls.set(self.create_calls.get() + 1);
            Ok("vol-1".to_string())
        }

        fn volume_status(&self, id: &str) -> Result<String, ApiError> {
            // available right away, gone as soon as it was deleted
            if self.deleted.borrow().iter().any(|deleted| deleted == id) {
                Err(ApiError::NotFound)
            } else {
                Ok("available".to_string())
            }
        }

        fn delete_volume(&self, id: &str) -> Result<(), ApiError> {
            self.deleted.borrow_mut().push(id.to_string());
            Ok(())
        }

        fn quota_set(&self, _project_id: &str) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn fast_opts(force_delete: bool) -> LifecycleOptions {
        LifecycleOptions {
            force_delete,
            timeout: 5,
            poll_interval: Duration::from_secs(0),
        }
    }

    fn probe(api: &MockVolumeApi) -> VolumeProbe<'_, MockVolumeApi> {
        VolumeProbe {
            api,
            spec: VolumeSpec {
                name: "monitoring_test".to_string(),
                size_gb: 1,
                volume_type: None,
                availability_zone: None,
            },
        }
    }

    #[test]
    fn happy_path_spawns_and_deletes_a_volume() {
        let api = MockVolumeApi::empty();
        let mut target = probe(&api);
        let report = lifecycle::run(&mut target, &fast_opts(false));
        assert_eq!(report.status(), Status::Ok);
        assert_eq!(api.create_calls.get(), 1);
        assert_eq!(api.deleted.borrow().len(), 1);
    }

    #[test]
    fn leftover_volume_blocks_creation() {
        let mut api = MockVolumeApi::empty();
        api.volumes = vec![
            VolumeSummary {
                id: "old-1".to_string(),
                name: Some("monitoring_test".to_string()),
            },
            VolumeSummary {
                id: "other".to_string(),
                name: Some("unrelated".to_string()),
            },
        ];
        let mut target = probe(&api);
        let report = lifecycle::run(&mut target, &fast_opts(false));
        assert_eq!(report.status(), Status::Critical);
        assert!(report.message().contains("Found 1 existing volume(s)"));
        assert_eq!(api.create_calls.get(), 0);
        assert!(api.deleted.borrow().is_empty());
    }

    #[test]
    fn force_delete_purges_leftovers_and_continues() {
        let mut api = MockVolumeApi::empty();
        api.volumes = vec![VolumeSummary {
            id: "old-1".to_string(),
            name: Some("monitoring_test".to_string()),
        }];
        let mut target = probe(&api);
        let report = lifecycle::run(&mut target, &fast_opts(true));
        assert_eq!(report.status(), Status::Ok);
        assert!(report.message().contains("Found 1 existing volume(s)"));
        assert_eq!(api.create_calls.get(), 1);
        // one purge plus the test volume's own deletion
        assert_eq!(api.deleted.borrow().len(), 2);
    }

    #[test]
    fn validate_argparse() {
        let args = Args::from_iter(
            [
                "check-cinder-volume",
                "--os-auth-url",
                "http://keystone:5000/v3",
                "--os-username",
                "monitoring",
                "--os-password",
                "secret",
                "--os-project-name",
                "monitoring",
                "--volume_size",
                "2",
                "--force_delete",
                "--timeout",
                "60",
            ]
            .iter(),
        );
        assert_eq!(args.volume_name, "monitoring_test");
        assert_eq!(args.volume_size, 2);
        assert!(args.force_delete);
        assert_eq!(args.timeout, 60);
    }
}
