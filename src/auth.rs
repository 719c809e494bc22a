//! Keystone v3 session handling: password authentication, the service
//! catalog, and the endpoint-override merge used by the lifecycle checks.

use std::time::Duration;

use log::debug;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use url::Url;

use crate::args::OpenStackArgs;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("cannot build the HTTP client: {0}")]
    Client(reqwest::Error),
    #[error("cannot reach keystone at {url}: {source}")]
    Http { url: String, source: reqwest::Error },
    #[error("keystone rejected the authentication request ({0})")]
    Rejected(reqwest::StatusCode),
    #[error("keystone response is missing {0}")]
    Malformed(&'static str),
    #[error("no usable '{0}' endpoint in the service catalog")]
    NoEndpoint(String),
    #[error("catalog endpoint is not a valid URL: {0}")]
    BadCatalogUrl(#[from] url::ParseError),
}

/// A caller-supplied `--endpoint_url` that cannot be used. Checks report
/// this as UNKNOWN: the configuration is wrong, not the service.
#[derive(Debug, Error)]
#[error("you must provide an endpoint_url in the form <scheme>://<host>[:port]/ ({0})")]
pub struct EndpointError(String);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
    project: Option<Project>,
}

#[derive(Debug, Deserialize)]
struct Project {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Deserialize)]
struct CatalogEndpoint {
    interface: String,
    region: Option<String>,
    url: String,
}

/// One authenticated Keystone session, reused by every API call a check
/// makes during its single invocation.
pub struct Session {
    http: Client,
    token: String,
    catalog: Vec<CatalogEntry>,
    region: Option<String>,
    project_id: String,
}

impl Session {
    /// Authenticate against Keystone with the given credentials and keep the
    /// issued token plus the service catalog around.
    pub fn authenticate(args: &OpenStackArgs) -> Result<Session, AuthError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(args.http_timeout))
            .danger_accept_invalid_certs(args.insecure)
            .build()
            .map_err(AuthError::Client)?;

        let url = format!("{}/auth/tokens", args.auth_url.trim_end_matches('/'));
        let body = json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": args.username,
                            "domain": {"name": args.user_domain},
                            "password": args.password,
                        }
                    }
                },
                "scope": {
                    "project": {
                        "name": args.project_name,
                        "domain": {"name": args.project_domain},
                    }
                }
            }
        });

        debug!("POST {}", url);
        let response = http
            .post(url.as_str())
            .json(&body)
            .send()
            .map_err(|source| AuthError::Http { url: url.clone(), source })?;

        if !response.status().is_success() {
            return Err(AuthError::Rejected(response.status()));
        }

        let token = response
            .headers()
            .get("x-subject-token")
            .and_then(|value| value.to_str().ok())
            .ok_or(AuthError::Malformed("the X-Subject-Token header"))?
            .to_string();

        let parsed: TokenResponse = response
            .json()
            .map_err(|source| AuthError::Http { url, source })?;
        let project_id = parsed
            .token
            .project
            .ok_or(AuthError::Malformed("the scoped project"))?
            .id;

        Ok(Session {
            http,
            token,
            catalog: parsed.token.catalog,
            region: args.region.clone(),
            project_id,
        })
    }

    /// The id of the project this session is scoped to.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Find the public endpoint for the first of the given service types
    /// present in the catalog, honoring `--os-region-name` when set.
    pub fn endpoint_for(&self, service_types: &[&str]) -> Result<Url, AuthError> {
        for wanted in service_types {
            let entry = match self.catalog.iter().find(|e| e.service_type == *wanted) {
                Some(entry) => entry,
                None => continue,
            };
            let endpoint = entry.endpoints.iter().find(|ep| {
                ep.interface == "public"
                    && match (&self.region, &ep.region) {
                        (Some(wanted), Some(actual)) => wanted == actual,
                        (Some(_), None) => false,
                        (None, _) => true,
                    }
            });
            if let Some(endpoint) = endpoint {
                return Ok(Url::parse(&endpoint.url)?);
            }
        }
        Err(AuthError::NoEndpoint(service_types.join("/")))
    }

    pub fn get(&self, url: Url) -> Result<Response, reqwest::Error> {
        debug!("GET {}", url);
        self.http
            .get(url)
            .header("X-Auth-Token", self.token.as_str())
            .send()
    }

    pub fn post_json(
        &self,
        url: Url,
        body: &serde_json::Value,
    ) -> Result<Response, reqwest::Error> {
        debug!("POST {}", url);
        self.http
            .post(url)
            .header("X-Auth-Token", self.token.as_str())
            .json(body)
            .send()
    }

    pub fn delete(&self, url: Url) -> Result<Response, reqwest::Error> {
        debug!("DELETE {}", url);
        self.http
            .delete(url)
            .header("X-Auth-Token", self.token.as_str())
            .send()
    }
}

/// Merge a caller-supplied endpoint URL with the catalog one.
///
/// Scheme and host come from the caller, the port falls back from the caller
/// URL to the catalog URL to the service's well-known default, and the path,
/// query and fragment are always taken from the catalog so project-scoped
/// paths survive the override.
pub fn merge_endpoint(
    caller_url: &str,
    catalog_url: &Url,
    default_port: u16,
) -> Result<Url, EndpointError> {
    let caller = Url::parse(caller_url).map_err(|e| EndpointError(e.to_string()))?;
    let host = caller
        .host_str()
        .ok_or_else(|| EndpointError(format!("no host in {}", caller_url)))?;
    let port = caller
        .port()
        .or_else(|| catalog_url.port())
        .unwrap_or(default_port);

    let mut merged = format!("{}://{}:{}{}", caller.scheme(), host, port, catalog_url.path());
    if let Some(query) = catalog_url.query() {
        merged.push('?');
        merged.push_str(query);
    }
    if let Some(fragment) = catalog_url.fragment() {
        merged.push('#');
        merged.push_str(fragment);
    }
    Url::parse(&merged).map_err(|e| EndpointError(e.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    fn catalog_url() -> Url {
        Url::parse("https://cinder.internal:8776/v3/abcdef?limit=1#frag").unwrap()
    }

    #[test]
    fn merge_takes_scheme_and_host_from_the_caller() {
        let merged = merge_endpoint("http://probe.example.com/", &catalog_url(), 8776).unwrap();
        assert_eq!(merged.scheme(), "http");
        assert_eq!(merged.host_str(), Some("probe.example.com"));
        assert_eq!(merged.path(), "/v3/abcdef");
        assert_eq!(merged.query(), Some("limit=1"));
        assert_eq!(merged.fragment(), Some("frag"));
    }

    #[test]
    fn merge_prefers_the_caller_port() {
        let merged =
            merge_endpoint("http://probe.example.com:9999/", &catalog_url(), 8776).unwrap();
        assert_eq!(merged.port(), Some(9999));
    }

    #[test]
    fn merge_falls_back_to_the_catalog_port() {
        let merged = merge_endpoint("http://probe.example.com/", &catalog_url(), 1234).unwrap();
        assert_eq!(merged.port(), Some(8776));
    }

    #[test]
    fn merge_falls_back_to_the_service_default_port() {
        let catalog = Url::parse("https://cinder.internal/v3/abcdef").unwrap();
        let merged = merge_endpoint("http://probe.example.com/", &catalog, 8776).unwrap();
        assert_eq!(merged.port(), Some(8776));
    }

    #[test]
    fn merge_rejects_garbage() {
        assert!(merge_endpoint("not a url", &catalog_url(), 8776).is_err());
    }
}
