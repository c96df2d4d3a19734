//! Pod records and the registry that locates them.

use crate::error::Result;
use crate::identifier::{canonical_iri, ResourceIdentifier};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A user-owned storage space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    pub id: String,
    pub base_url: String,
    #[serde(default)]
    pub owner_web_ids: BTreeSet<String>,
}

impl Pod {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            owner_web_ids: BTreeSet::new(),
        }
    }

    pub fn with_owner(mut self, web_id: impl Into<String>) -> Self {
        self.owner_web_ids.insert(web_id.into());
        self
    }

    pub fn owners(&self) -> &BTreeSet<String> {
        &self.owner_web_ids
    }

    /// A resource is in the pod iff its URI starts with the pod base URL.
    pub fn contains(&self, id: &ResourceIdentifier) -> bool {
        id.as_str().starts_with(&canonical_iri(&self.base_url))
    }

    pub fn is_owner(&self, web_id: &str) -> bool {
        self.owner_web_ids.contains(web_id)
    }
}

/// Read-only view of the pods hosted by the server.
#[async_trait]
pub trait PodRegistry: Send + Sync {
    async fn find_by_uri(&self, id: &ResourceIdentifier) -> Result<Option<Pod>>;
}
