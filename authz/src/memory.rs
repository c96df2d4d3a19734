//! In-memory collaborators for tests, development servers and the CLI.
//!
//! All of them are built up front and immutable afterwards, so they can be
//! shared across concurrent authorizations without locking.

use crate::error::{AuthzError, Result};
use crate::identifier::{canonical_iri, ResourceIdentifier};
use crate::pods::{Pod, PodRegistry};
use crate::sources::{GroupMembership, ResourceFetcher, ResourceSet};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Documents and resource existence held in memory.
///
/// Storing a document also marks its identifier as existing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    documents: HashMap<ResourceIdentifier, Vec<u8>>,
    resources: HashSet<ResourceIdentifier>,
    failing: HashSet<ResourceIdentifier>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a resource as existing.
    pub fn with_resource(mut self, id: impl Into<ResourceIdentifier>) -> Self {
        self.resources.insert(id.into());
        self
    }

    /// Stores a document body.
    pub fn with_document(mut self, id: impl Into<ResourceIdentifier>, body: impl Into<Vec<u8>>) -> Self {
        let id = id.into();
        self.resources.insert(id.clone());
        self.documents.insert(id, body.into());
        self
    }

    /// Makes every access to `id` fail with an I/O error.
    pub fn with_failure(mut self, id: impl Into<ResourceIdentifier>) -> Self {
        self.failing.insert(id.into());
        self
    }

    fn check(&self, id: &ResourceIdentifier) -> Result<()> {
        if self.failing.contains(id) {
            return Err(AuthzError::Fetch(format!("simulated I/O failure on {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceFetcher for InMemoryStore {
    async fn get(&self, id: &ResourceIdentifier) -> Result<Option<Vec<u8>>> {
        self.check(id)?;
        let document = self.documents.get(id).cloned();
        debug!("In-memory fetch of {}: found={}", id, document.is_some());
        Ok(document)
    }
}

#[async_trait]
impl ResourceSet for InMemoryStore {
    async fn has(&self, id: &ResourceIdentifier) -> Result<bool> {
        self.check(id)?;
        Ok(self.resources.contains(id))
    }
}

/// Fixed group memberships: group IRI → member WebIDs, both kept in
/// canonical form.
#[derive(Debug, Clone, Default)]
pub struct StaticGroups {
    groups: HashMap<String, HashSet<String>>,
}

impl StaticGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(mut self, group: impl Into<String>, web_id: impl Into<String>) -> Self {
        self.groups
            .entry(canonical_iri(&group.into()))
            .or_default()
            .insert(canonical_iri(&web_id.into()));
        self
    }
}

impl FromIterator<(String, Vec<String>)> for StaticGroups {
    fn from_iter<T: IntoIterator<Item = (String, Vec<String>)>>(iter: T) -> Self {
        let mut groups = StaticGroups::new();
        for (group, members) in iter {
            groups
                .groups
                .entry(canonical_iri(&group))
                .or_default()
                .extend(members.iter().map(|member| canonical_iri(member)));
        }
        groups
    }
}

#[async_trait]
impl GroupMembership for StaticGroups {
    async fn is_member(&self, web_id: &str, group: &str) -> Result<bool> {
        Ok(self
            .groups
            .get(group)
            .is_some_and(|members| members.contains(web_id)))
    }
}

/// Pods held in memory; lookups pick the pod with the longest matching base.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPodRegistry {
    pods: Vec<Pod>,
}

impl InMemoryPodRegistry {
    pub fn new(pods: impl IntoIterator<Item = Pod>) -> Self {
        Self {
            pods: pods.into_iter().collect(),
        }
    }
}

#[async_trait]
impl PodRegistry for InMemoryPodRegistry {
    async fn find_by_uri(&self, id: &ResourceIdentifier) -> Result<Option<Pod>> {
        Ok(self
            .pods
            .iter()
            .filter(|pod| pod.contains(id))
            .max_by_key(|pod| pod.base_url.len())
            .cloned())
    }
}
