//! The Nova (compute) API surface used by the checks.

use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::auth::{merge_endpoint, EndpointError, Session};

use super::{expect_json, expect_success, service_url, ApiError};

pub const DEFAULT_PORT: u16 = 8774;

#[derive(Debug, Clone, Deserialize)]
pub struct Flavor {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub id: String,
    // the create response only carries an id and links
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created: String,
}

pub trait ComputeApi {
    fn ping(&self) -> Result<(), ApiError>;
    fn list_flavors(&self) -> Result<Vec<Flavor>, ApiError>;
    fn find_flavor(&self, name: &str) -> Result<Option<Flavor>, ApiError>;
    fn list_servers(&self) -> Result<Vec<Server>, ApiError>;
    fn server(&self, id: &str) -> Result<Server, ApiError>;
    fn create_server(
        &self,
        name: &str,
        image_id: &str,
        flavor_id: &str,
        network_id: Option<&str>,
    ) -> Result<String, ApiError>;
    fn delete_server(&self, id: &str) -> Result<(), ApiError>;
}

pub struct ComputeClient<'a> {
    session: &'a Session,
    endpoint: Url,
}

impl<'a> ComputeClient<'a> {
    pub fn new(session: &'a Session) -> Result<ComputeClient<'a>, ApiError> {
        let endpoint = session.endpoint_for(&["compute"])?;
        Ok(ComputeClient { session, endpoint })
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
struct FlavorList {
    flavors: Vec<Flavor>,
}

#[derive(Debug, Deserialize)]
struct ServerList {
    servers: Vec<Server>,
}

#[derive(Debug, Deserialize)]
struct ServerEnvelope {
    server: Server,
}

impl ComputeApi for ComputeClient<'_> {
    fn ping(&self) -> Result<(), ApiError> {
        let url = service_url(&self.endpoint, "limits")?;
        expect_success(self.session.get(url)?)
    }

    fn list_flavors(&self) -> Result<Vec<Flavor>, ApiError> {
        let url = service_url(&self.endpoint, "flavors")?;
        let list: FlavorList = expect_json(self.session.get(url)?)?;
        Ok(list.flavors)
    }

    fn find_flavor(&self, name: &str) -> Result<Option<Flavor>, ApiError> {
        Ok(self.list_flavors()?.into_iter().find(|f| f.name == name))
    }

    fn list_servers(&self) -> Result<Vec<Server>, ApiError> {
        let url = service_url(&self.endpoint, "servers/detail")?;
        let list: ServerList = expect_json(self.session.get(url)?)?;
        Ok(list.servers)
    }

    fn server(&self, id: &str) -> Result<Server, ApiError> {
        let url = service_url(&self.endpoint, &format!("servers/{}", id))?;
        let detail: ServerEnvelope = expect_json(self.session.get(url)?)?;
        Ok(detail.server)
    }

    fn create_server(
        &self,
        name: &str,
        image_id: &str,
        flavor_id: &str,
        network_id: Option<&str>,
    ) -> Result<String, ApiError> {
        let mut server = json!({
            "name": name,
            "imageRef": image_id,
            "flavorRef": flavor_id,
        });
        if let Some(network_id) = network_id {
            server["networks"] = json!([{ "uuid": network_id }]);
        }
        let url = service_url(&self.endpoint, "servers")?;
        let body = json!({ "server": server });
        let created: ServerEnvelope = expect_json(self.session.post_json(url, &body)?)?;
        Ok(created.server.id)
    }

    fn delete_server(&self, id: &str) -> Result<(), ApiError> {
        let url = service_url(&self.endpoint, &format!("servers/{}", id))?;
        expect_success(self.session.delete(url)?)
    }
}
