//! The Glance (image) API surface used by the checks.

use serde::Deserialize;
use url::Url;

use crate::auth::Session;

use super::{expect_json, service_url, ApiError};

#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

pub trait ImageApi {
    fn list_images(&self, limit: usize) -> Result<Vec<Image>, ApiError>;
    fn find_images(&self, name: &str) -> Result<Vec<Image>, ApiError>;
}

pub struct ImageClient<'a> {
    session: &'a Session,
    endpoint: Url,
}

impl<'a> ImageClient<'a> {
    pub fn new(session: &'a Session) -> Result<ImageClient<'a>, ApiError> {
        let endpoint = session.endpoint_for(&["image"])?;
        Ok(ImageClient { session, endpoint })
    }
}

#[derive(Debug, Deserialize)]
struct ImageList {
    images: Vec<Image>,
}

impl ImageApi for ImageClient<'_> {
    fn list_images(&self, limit: usize) -> Result<Vec<Image>, ApiError> {
        let mut url = service_url(&self.endpoint, "v2/images")?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        let list: ImageList = expect_json(self.session.get(url)?)?;
        Ok(list.images)
    }

    fn find_images(&self, name: &str) -> Result<Vec<Image>, ApiError> {
        let mut url = service_url(&self.endpoint, "v2/images")?;
        url.query_pairs_mut().append_pair("name", name);
        let list: ImageList = expect_json(self.session.get(url)?)?;
        Ok(list.images)
    }
}
