//! The Neutron (networking) API surface used by the checks.

use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::auth::{merge_endpoint, EndpointError, Session};

use super::{expect_json, expect_success, service_url, ApiError};

pub const DEFAULT_PORT: u16 = 9696;

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "router:external", default)]
    pub external: bool,
    #[serde(default)]
    pub subnets: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FloatingIp {
    pub id: String,
    pub floating_ip_address: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Router {
    pub id: String,
    #[serde(default)]
    pub external_gateway_info: Option<serde_json::Value>,
}

pub trait NetworkApi {
    fn ping(&self) -> Result<(), ApiError>;
    fn list_networks(&self) -> Result<Vec<NetworkSummary>, ApiError>;
    fn find_network(&self, name: &str) -> Result<Option<NetworkSummary>, ApiError>;
    fn subnet_cidr(&self, id: &str) -> Result<String, ApiError>;
    fn list_floating_ips(&self, project_id: Option<&str>) -> Result<Vec<FloatingIp>, ApiError>;
    fn create_floating_ip(&self, network_id: &str) -> Result<FloatingIp, ApiError>;
    fn floating_ip(&self, id: &str) -> Result<FloatingIp, ApiError>;
    fn delete_floating_ip(&self, id: &str) -> Result<(), ApiError>;
    fn list_routers(&self) -> Result<Vec<Router>, ApiError>;
}

pub struct NetworkClient<'a> {
    session: &'a Session,
    endpoint: Url,
}

impl<'a> NetworkClient<'a> {
    pub fn new(session: &'a Session) -> Result<NetworkClient<'a>, ApiError> {
        let endpoint = session.endpoint_for(&["network"])?;
        Ok(NetworkClient { session, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn override_endpoint(&mut self, caller_url: &str) -> Result<(), EndpointError> {
        self.endpoint = merge_endpoint(caller_url, &self.endpoint, DEFAULT_PORT)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct NetworkList {
    networks: Vec<NetworkSummary>,
}

#[derive(Debug, Deserialize)]
struct SubnetEnvelope {
    subnet: Subnet,
}

#[derive(Debug, Deserialize)]
struct Subnet {
    cidr: String,
}

#[derive(Debug, Deserialize)]
struct FloatingIpList {
    floatingips: Vec<FloatingIp>,
}

#[derive(Debug, Deserialize)]
struct FloatingIpEnvelope {
    floatingip: FloatingIp,
}

#[derive(Debug, Deserialize)]
struct RouterList {
    routers: Vec<Router>,
}

impl NetworkApi for NetworkClient<'_> {
    fn ping(&self) -> Result<(), ApiError> {
        let url = service_url(&self.endpoint, "v2.0/ports")?;
        expect_success(self.session.get(url)?)
    }

    fn list_networks(&self) -> Result<Vec<NetworkSummary>, ApiError> {
        let url = service_url(&self.endpoint, "v2.0/networks")?;
        let list: NetworkList = expect_json(self.session.get(url)?)?;
        Ok(list.networks)
    }

    fn find_network(&self, name: &str) -> Result<Option<NetworkSummary>, ApiError> {
        Ok(self.list_networks()?.into_iter().find(|n| n.name == name))
    }

    fn subnet_cidr(&self, id: &str) -> Result<String, ApiError> {
        let url = service_url(&self.endpoint, &format!("v2.0/subnets/{}", id))?;
        let detail: SubnetEnvelope = expect_json(self.session.get(url)?)?;
        Ok(detail.subnet.cidr)
    }

    fn list_floating_ips(&self, project_id: Option<&str>) -> Result<Vec<FloatingIp>, ApiError> {
        let mut url = service_url(&self.endpoint, "v2.0/floatingips")?;
        if let Some(project_id) = project_id {
            url.query_pairs_mut().append_pair("project_id", project_id);
        }
        let list: FloatingIpList = expect_json(self.session.get(url)?)?;
        Ok(list.floatingips)
    }

    fn create_floating_ip(&self, network_id: &str) -> Result<FloatingIp, ApiError> {
        let url = service_url(&self.endpoint, "v2.0/floatingips")?;
        let body = json!({ "floatingip": { "floating_network_id": network_id } });
        let created: FloatingIpEnvelope = expect_json(self.session.post_json(url, &body)?)?;
        Ok(created.floatingip)
    }

    fn floating_ip(&self, id: &str) -> Result<FloatingIp, ApiError> {
        let url = service_url(&self.endpoint, &format!("v2.0/floatingips/{}", id))?;
        let detail: FloatingIpEnvelope = expect_json(self.session.get(url)?)?;
        Ok(detail.floatingip)
    }

    fn delete_floating_ip(&self, id: &str) -> Result<(), ApiError> {
        let url = service_url(&self.endpoint, &format!("v2.0/floatingips/{}", id))?;
        expect_success(self.session.delete(url)?)
    }

    fn list_routers(&self) -> Result<Vec<Router>, ApiError> {
        let url = service_url(&self.endpoint, "v2.0/routers")?;
        let list: RouterList = expect_json(self.session.get(url)?)?;
        Ok(list.routers)
    }
}
