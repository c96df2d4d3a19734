use super::PermissionReader;
use crate::document::{
    control_document_permissions, evaluate_rules, load_document, AuthorizationRule,
    SubjectContext, WebAclSource,
};
use crate::error::Result;
use crate::identifier::{AuxiliaryStrategy, IdentifierStrategy, ResourceIdentifier};
use crate::sources::{GroupMembership, ResourceFetcher};
use crate::types::{AccessMap, Credentials, PermissionMap};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Evaluates WebACL documents.
///
/// The governing document of a resource is its own `.acl` if that exists
/// and holds at least one rule, otherwise the nearest ancestor container's.
/// Requests for an `.acl` document itself are answered from the `Control`
/// permission on its subject.
pub struct WebAclReader {
    fetcher: Arc<dyn ResourceFetcher>,
    identifiers: IdentifierStrategy,
    groups: Arc<dyn GroupMembership>,
    acl: AuxiliaryStrategy,
}

/// Parsed documents for the duration of one read, keyed by document URI.
type DocumentCache = HashMap<ResourceIdentifier, Option<Arc<Vec<AuthorizationRule>>>>;

impl WebAclReader {
    pub fn new(
        fetcher: Arc<dyn ResourceFetcher>,
        identifiers: IdentifierStrategy,
        groups: Arc<dyn GroupMembership>,
    ) -> Self {
        Self {
            fetcher,
            identifiers,
            groups,
            acl: AuxiliaryStrategy::acl(),
        }
    }

    async fn rules_of(
        &self,
        container: &ResourceIdentifier,
        cache: &mut DocumentCache,
    ) -> Result<Option<Arc<Vec<AuthorizationRule>>>> {
        let document = self.acl.auxiliary_of(container);
        if let Some(cached) = cache.get(&document) {
            return Ok(cached.clone());
        }
        let rules = load_document(self.fetcher.as_ref(), &WebAclSource, &document, container)
            .await?
            .map(|parsed| Arc::new(parsed.into_rules()))
            .filter(|rules| !rules.is_empty());
        cache.insert(document, rules.clone());
        Ok(rules)
    }

    async fn governing_rules(
        &self,
        subject: &ResourceIdentifier,
        cache: &mut DocumentCache,
    ) -> Result<Option<Arc<Vec<AuthorizationRule>>>> {
        let candidates = std::iter::once(subject.clone()).chain(self.identifiers.ancestors(subject));
        for candidate in candidates {
            if let Some(rules) = self.rules_of(&candidate, cache).await? {
                debug!("{} is governed by {}", subject, self.acl.auxiliary_of(&candidate));
                return Ok(Some(rules));
            }
        }
        debug!("No governing ACL for {}", subject);
        Ok(None)
    }
}

#[async_trait]
impl PermissionReader for WebAclReader {
    async fn read(&self, credentials: &Credentials, requested: &AccessMap) -> Result<PermissionMap> {
        let mut cache = DocumentCache::new();
        let mut governed = Vec::new();
        for id in requested.resources() {
            let (subject, is_acl) = match self.acl.subject_of(id) {
                Some(subject) => (subject, true),
                None => (id.clone(), false),
            };
            let rules = self.governing_rules(&subject, &mut cache).await?;
            governed.push((id.clone(), subject, is_acl, rules));
        }

        let referenced: Vec<&AuthorizationRule> = governed
            .iter()
            .filter_map(|(_, _, _, rules)| rules.as_deref())
            .flatten()
            .collect();
        let context = SubjectContext::resolve(credentials, referenced, self.groups.as_ref()).await?;

        let mut result = PermissionMap::new();
        for (id, subject, is_acl, rules) in governed {
            let rules = rules.as_deref().map(Vec::as_slice).unwrap_or_default();
            let set = evaluate_rules(rules, &subject, &context, &self.identifiers);
            let set = if is_acl { control_document_permissions(&set) } else { set };
            result.insert(id, set);
        }
        Ok(result)
    }
}
