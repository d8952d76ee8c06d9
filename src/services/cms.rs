//! # CMS Content
//!
//! Fetches server-rendered markup: named containers and category views.
//! Payloads arrive as arrays of JSON fragments and come back as detached
//! [`Element`] trees, ready for `replace_children`.

use std::rc::Rc;

use serde_json::Value;

use crate::api::{ApiClient, ApiError};
use crate::dom::Element;

pub struct Cms {
    api: Rc<ApiClient>,
}

impl Cms {
    pub fn new(api: Rc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn container(&self, group: &str, name: &str) -> Result<Vec<Element>, ApiError> {
        let response = self
            .api
            .get(&format!("/rest/containers/{group}/{name}"))
            .await?;
        fragments(&response.data)
    }

    pub async fn category_content(&self, category_id: u64) -> Result<Vec<Element>, ApiError> {
        let response = self.api.get(&format!("/rest/categoryview/{category_id}")).await?;
        fragments(&response.data)
    }
}

fn fragments(data: &Value) -> Result<Vec<Element>, ApiError> {
    let list = data
        .as_array()
        .ok_or_else(|| ApiError::Payload("container payload is not a fragment list".to_string()))?;
    list.iter()
        .map(|json| Element::from_json(json).map_err(|e| ApiError::Payload(e.to_string())))
        .collect()
}
