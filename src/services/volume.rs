//! The Cinder (block storage) API surface used by the checks.

use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::auth::{merge_endpoint, EndpointError, Session};

use super::{expect_json, expect_success, service_url, ApiError};

/// Cinder's well-known API port, used when neither the override URL nor the
/// catalog carry an explicit one.
pub const DEFAULT_PORT: u16 = 8776;

#[derive(Debug, Clone, Deserialize)]
pub struct VolumeSummary {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// What to create for the volume lifecycle check.
#[derive(Debug, Clone)]
pub struct VolumeSpec {
    pub name: String,
    pub size_gb: u64,
    pub volume_type: Option<String>,
    pub availability_zone: Option<String>,
}

pub trait VolumeApi {
    /// A cheap read that proves the endpoint answers.
    fn ping(&self) -> Result<(), ApiError>;
    fn list_volumes(&self) -> Result<Vec<VolumeSummary>, ApiError>;
    fn create_volume(&self, spec: &VolumeSpec) -> Result<String, ApiError>;
    fn volume_status(&self, id: &str) -> Result<String, ApiError>;
    fn delete_volume(&self, id: &str) -> Result<(), ApiError>;
    fn quota_set(&self, project_id: &str) -> Result<(), ApiError>;
}

pub struct VolumeClient<'a> {
    session: &'a Session,
    endpoint: Url,
}

impl<'a> VolumeClient<'a> {
    pub fn new(session: &'a Session) -> Result<VolumeClient<'a>, ApiError> {
        let endpoint = session.endpoint_for(&["volumev3", "block-storage"])?;
        Ok(VolumeClient { session, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Replace scheme/host/port of the catalog endpoint with the caller's.
    pub fn override_endpoint(&mut self, caller_url: &str) -> Result<(), EndpointError> {
        self.endpoint = merge_endpoint(caller_url, &self.endpoint, DEFAULT_PORT)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct VolumeList {
    volumes: Vec<VolumeSummary>,
}

#[derive(Debug, Deserialize)]
struct VolumeEnvelope {
    volume: VolumeDetail,
}

#[derive(Debug, Deserialize)]
struct VolumeDetail {
    id: String,
    status: String,
}

impl VolumeApi for VolumeClient<'_> {
    fn ping(&self) -> Result<(), ApiError> {
        let url = service_url(&self.endpoint, "limits")?;
        expect_success(self.session.get(url)?)
    }

    fn list_volumes(&self) -> Result<Vec<VolumeSummary>, ApiError> {
        let url = service_url(&self.endpoint, "volumes")?;
        let list: VolumeList = expect_json(self.session.get(url)?)?;
        Ok(list.volumes)
    }

    fn create_volume(&self, spec: &VolumeSpec) -> Result<String, ApiError> {
        let mut volume = json!({
            "name": spec.name,
            "size": spec.size_gb,
        });
        if let Some(ref volume_type) = spec.volume_type {
            volume["volume_type"] = json!(volume_type);
        }
        if let Some(ref zone) = spec.availability_zone {
            volume["availability_zone"] = json!(zone);
        }
        let url = service_url(&self.endpoint, "volumes")?;
        let body = json!({ "volume": volume });
        let created: VolumeEnvelope = expect_json(self.session.post_json(url, &body)?)?;
        Ok(created.volume.id)
    }

    fn volume_status(&self, id: &str) -> Result<String, ApiError> {
        let url = service_url(&self.endpoint, &format!("volumes/{}", id))?;
        let detail: VolumeEnvelope = expect_json(self.session.get(url)?)?;
        Ok(detail.volume.status)
    }

    fn delete_volume(&self, id: &str) -> Result<(), ApiError> {
        let url = service_url(&self.endpoint, &format!("volumes/{}", id))?;
        expect_success(self.session.delete(url)?)
    }

    fn quota_set(&self, project_id: &str) -> Result<(), ApiError> {
        let url = service_url(&self.endpoint, &format!("os-quota-sets/{}", project_id))?;
        expect_success(self.session.get(url)?)
    }
}
