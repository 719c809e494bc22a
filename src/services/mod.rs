//! Thin typed clients for the OpenStack service APIs.
//!
//! Each service exposes a small trait covering exactly the calls the checks
//! need, plus a reqwest-backed implementation. Checks are written against
//! the traits so tests can swap in canned responses instead of a cloud.

use reqwest::blocking::Response;
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use crate::auth::AuthError;

pub mod compute;
pub mod image;
pub mod network;
pub mod telemetry;
pub mod volume;

pub use compute::{ComputeApi, ComputeClient, Server};
pub use image::{Image, ImageApi, ImageClient};
pub use network::{FloatingIp, NetworkApi, NetworkClient, NetworkSummary, Router};
pub use telemetry::{TelemetryApi, TelemetryClient};
pub use volume::{VolumeApi, VolumeClient, VolumeSpec, VolumeSummary};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Auth(#[from] AuthError),
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("not found")]
    NotFound,
    #[error("unexpected response ({status}): {body}")]
    Unexpected { status: StatusCode, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound)
    }
}

/// Build a request URL below a catalog endpoint, tolerating endpoints with
/// and without a trailing slash.
pub(crate) fn service_url(endpoint: &Url, path: &str) -> Result<Url, ApiError> {
    Url::parse(&format!(
        "{}/{}",
        endpoint.as_str().trim_end_matches('/'),
        path
    ))
    .map_err(|e| ApiError::Malformed(format!("cannot build a request URL: {}", e)))
}

/// Deserialize a successful response, turning provider 404s into
/// [`ApiError::NotFound`] so status polls can detect deletion.
pub(crate) fn expect_json<T>(response: Response) -> Result<T, ApiError>
where
    T: serde::de::DeserializeOwned,
{
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound);
    }
    if !status.is_success() {
        return Err(ApiError::Unexpected {
            status,
            body: response.text().unwrap_or_default(),
        });
    }
    Ok(response.json()?)
}

/// Like [`expect_json`] for calls whose body we do not care about.
pub(crate) fn expect_success(response: Response) -> Result<(), ApiError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound);
    }
    if !status.is_success() {
        return Err(ApiError::Unexpected {
            status,
            body: response.text().unwrap_or_default(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn service_url_tolerates_trailing_slashes() {
        let with = Url::parse("http://cinder:8776/v3/abc/").unwrap();
        let without = Url::parse("http://cinder:8776/v3/abc").unwrap();
        assert_eq!(
            service_url(&with, "volumes").unwrap().as_str(),
            "http://cinder:8776/v3/abc/volumes"
        );
        assert_eq!(
            service_url(&without, "volumes").unwrap().as_str(),
            "http://cinder:8776/v3/abc/volumes"
        );
    }
}
