use super::PermissionReader;
use crate::document::{
    control_document_permissions, evaluate_rules, load_document, AcpSource, AuthorizationRule,
    SubjectContext,
};
use crate::error::Result;
use crate::identifier::{AuxiliaryStrategy, IdentifierStrategy, ResourceIdentifier};
use crate::sources::{GroupMembership, ResourceFetcher};
use crate::types::{AccessMap, Credentials, PermissionMap};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Evaluates ACP access control resources.
///
/// A resource is governed by the `policies` of its own `.acp` plus the
/// `memberPolicies` of every ancestor container's `.acp`. Deny rules win
/// over allow rules. Requests for an `.acp` resource itself are answered
/// from the `Control` permission on its subject.
pub struct AcpReader {
    fetcher: Arc<dyn ResourceFetcher>,
    identifiers: IdentifierStrategy,
    groups: Arc<dyn GroupMembership>,
    acp: AuxiliaryStrategy,
}

impl AcpReader {
    pub fn new(
        fetcher: Arc<dyn ResourceFetcher>,
        identifiers: IdentifierStrategy,
        groups: Arc<dyn GroupMembership>,
    ) -> Self {
        Self {
            fetcher,
            identifiers,
            groups,
            acp: AuxiliaryStrategy::acp(),
        }
    }

    async fn rules_of(
        &self,
        controlled: &ResourceIdentifier,
        cache: &mut HashMap<ResourceIdentifier, Arc<Vec<AuthorizationRule>>>,
    ) -> Result<Arc<Vec<AuthorizationRule>>> {
        if let Some(rules) = cache.get(controlled) {
            return Ok(rules.clone());
        }
        let document = self.acp.auxiliary_of(controlled);
        let rules = load_document(self.fetcher.as_ref(), &AcpSource, &document, controlled)
            .await?
            .map(|parsed| parsed.into_rules())
            .unwrap_or_default();
        let rules = Arc::new(rules);
        cache.insert(controlled.clone(), rules.clone());
        Ok(rules)
    }
}

#[async_trait]
impl PermissionReader for AcpReader {
    async fn read(&self, credentials: &Credentials, requested: &AccessMap) -> Result<PermissionMap> {
        let mut cache = HashMap::new();
        let mut governed = Vec::new();
        for id in requested.resources() {
            let (subject, is_acr) = match self.acp.subject_of(id) {
                Some(subject) => (subject, true),
                None => (id.clone(), false),
            };
            let mut rules = Vec::new();
            let controllers = std::iter::once(subject.clone()).chain(self.identifiers.ancestors(&subject));
            for controlled in controllers {
                rules.extend(self.rules_of(&controlled, &mut cache).await?.iter().cloned());
            }
            governed.push((id.clone(), subject, is_acr, rules));
        }

        let referenced: Vec<&AuthorizationRule> =
            governed.iter().flat_map(|(_, _, _, rules)| rules.iter()).collect();
        let context = SubjectContext::resolve(credentials, referenced, self.groups.as_ref()).await?;

        let mut result = PermissionMap::new();
        for (id, subject, is_acr, rules) in governed {
            let set = evaluate_rules(&rules, &subject, &context, &self.identifiers);
            let set = if is_acr { control_document_permissions(&set) } else { set };
            result.insert(id, set);
        }
        Ok(result)
    }
}
