//! FHIR Bundle model for search-set pagination
//!
//! Only the fields the page walker navigates by are typed; everything else
//! in the resource is kept verbatim in `rest`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Relation naming the following page of a search set.
pub const NEXT_RELATION: &str = "next";

/// A navigation link (`first`, `previous`, `self`, `next`, `last`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleLink {
    pub relation: String,
    pub url: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl BundleLink {
    fn into_value(self) -> Value {
        let mut object = self.rest;
        object.insert("relation".into(), self.relation.into());
        object.insert("url".into(), self.url.into());
        Value::Object(object)
    }
}

/// A FHIR resource as returned by a search; usually `resourceType: "Bundle"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(rename = "resourceType", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub bundle_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link: Vec<BundleLink>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl Bundle {
    /// Interpret an already-parsed response body.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::Decode(format!("invalid bundle: {e}")))
    }

    /// Reassemble the resource, unknown fields included.
    pub fn into_value(self) -> Value {
        let mut object = self.rest;
        if let Some(resource_type) = self.resource_type {
            object.insert("resourceType".into(), resource_type.into());
        }
        if let Some(bundle_type) = self.bundle_type {
            object.insert("type".into(), bundle_type.into());
        }
        if !self.link.is_empty() {
            let links = self.link.into_iter().map(BundleLink::into_value).collect();
            object.insert("link".into(), Value::Array(links));
        }
        Value::Object(object)
    }

    /// URL of the first link with the given relation.
    pub fn link_url(&self, relation: &str) -> Option<&str> {
        self.link
            .iter()
            .find(|l| l.relation == relation)
            .map(|l| l.url.as_str())
    }

    /// URL of the following page, if the chain continues.
    pub fn next_link(&self) -> Option<&str> {
        self.link_url(NEXT_RELATION)
    }

    /// Resource `id`, when present.
    pub fn id(&self) -> Option<&str> {
        self.rest.get("id").and_then(Value::as_str)
    }
}
