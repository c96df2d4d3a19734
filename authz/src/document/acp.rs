//! ACP access control resources.
//!
//! ```json
//! {
//!   "policies": [{
//!     "id": "#read",
//!     "allow": ["acl:Read"],
//!     "deny": [],
//!     "allOf": [{"agent": ["acp:PublicAgent"]}],
//!     "anyOf": [],
//!     "noneOf": [{"client": ["https://untrusted.app/id"]}]
//!   }],
//!   "memberPolicies": []
//! }
//! ```
//!
//! `policies` govern the controlled resource itself; `memberPolicies` govern
//! everything below it when it is a container. A policy is satisfied when
//! every `allOf` matcher, at least one `anyOf` matcher and no `noneOf`
//! matcher is satisfied. A policy with neither `allOf` nor `anyOf` is never
//! satisfied and is skipped.

use super::{
    document_base, local_name, resolve_term, AppliesTo, AuthorizationRule, DocumentSource,
    OneOrMany, PermissionDocument, Polarity, Subject, SubjectMatcher, ACL_NS, ACP_NS,
};
use crate::error::{AuthzError, Result};
use crate::identifier::ResourceIdentifier;
use crate::types::{AccessMode, ModeSet};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAccessControlResource {
    #[serde(default)]
    policies: Vec<RawPolicy>,
    #[serde(default)]
    member_policies: Vec<RawPolicy>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPolicy {
    #[serde(default, alias = "@id")]
    id: Option<String>,
    #[serde(default)]
    allow: OneOrMany,
    #[serde(default)]
    deny: OneOrMany,
    #[serde(default)]
    all_of: Vec<RawMatcher>,
    #[serde(default)]
    any_of: Vec<RawMatcher>,
    #[serde(default)]
    none_of: Vec<RawMatcher>,
}

#[derive(Debug, Deserialize)]
struct RawMatcher {
    #[serde(default)]
    agent: OneOrMany,
    #[serde(default)]
    client: OneOrMany,
    #[serde(default)]
    issuer: OneOrMany,
}

/// Parses ACP resources into allow and deny rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcpSource;

impl DocumentSource for AcpSource {
    fn parse(
        &self,
        document: &ResourceIdentifier,
        subject: &ResourceIdentifier,
        body: &[u8],
    ) -> Result<PermissionDocument> {
        let raw: RawAccessControlResource =
            serde_json::from_slice(body).map_err(|e| AuthzError::malformed(document.as_str(), e))?;
        let base = document_base(document)?;

        let mut rules = Vec::new();
        let own = AppliesTo::AccessTo(subject.clone());
        for policy in &raw.policies {
            rules.extend(convert(&base, document, policy, &own));
        }

        if subject.is_container() {
            let members = AppliesTo::Default(subject.clone());
            for policy in &raw.member_policies {
                rules.extend(convert(&base, document, policy, &members));
            }
        } else if !raw.member_policies.is_empty() {
            debug!("Ignoring member policies of non-container {}", subject);
        }

        Ok(PermissionDocument::Acp { rules })
    }
}

fn convert(
    base: &url::Url,
    document: &ResourceIdentifier,
    raw: &RawPolicy,
    target: &AppliesTo,
) -> Vec<AuthorizationRule> {
    let label = raw.id.as_deref().unwrap_or("<anonymous>");
    if raw.all_of.is_empty() && raw.any_of.is_empty() {
        warn!("Skipping policy {} in {}: no allOf or anyOf matchers", label, document);
        return Vec::new();
    }

    let mut clauses = Vec::new();
    clauses.extend(raw.all_of.iter().map(|m| matcher(base, m)));
    if !raw.any_of.is_empty() {
        clauses.push(SubjectMatcher::AnyOf(
            raw.any_of.iter().map(|m| matcher(base, m)).collect(),
        ));
    }
    if !raw.none_of.is_empty() {
        clauses.push(SubjectMatcher::Not(Box::new(SubjectMatcher::AnyOf(
            raw.none_of.iter().map(|m| matcher(base, m)).collect(),
        ))));
    }
    let subjects = SubjectMatcher::AllOf(clauses);

    let mut rules = Vec::new();
    for (values, polarity) in [(&raw.allow, Polarity::Allow), (&raw.deny, Polarity::Deny)] {
        let modes = parse_modes(values);
        if modes.is_empty() {
            continue;
        }
        rules.push(AuthorizationRule {
            id: raw.id.clone(),
            subjects: subjects.clone(),
            modes,
            applies_to: BTreeSet::from([target.clone()]),
            polarity,
        });
    }
    if rules.is_empty() {
        warn!("Skipping policy {} in {}: no known modes", label, document);
    }
    rules
}

/// A matcher is satisfied when each attribute it sets has a matching value.
/// A matcher without attributes matches nobody.
fn matcher(base: &url::Url, raw: &RawMatcher) -> SubjectMatcher {
    let mut attributes = Vec::new();

    let agents: Vec<Subject> = raw
        .agent
        .values()
        .into_iter()
        .filter_map(|value| agent(base, value))
        .collect();
    if !raw.agent.values().is_empty() {
        attributes.push(SubjectMatcher::any_of(agents));
    }

    let clients: Vec<Subject> = raw
        .client
        .values()
        .into_iter()
        .filter_map(|value| resolve_term(base, value).map(Subject::Client))
        .collect();
    if !raw.client.values().is_empty() {
        attributes.push(SubjectMatcher::any_of(clients));
    }

    let issuers: Vec<Subject> = raw
        .issuer
        .values()
        .into_iter()
        .filter_map(|value| resolve_term(base, value).map(Subject::Issuer))
        .collect();
    if !raw.issuer.values().is_empty() {
        attributes.push(SubjectMatcher::any_of(issuers));
    }

    if attributes.is_empty() {
        return SubjectMatcher::AnyOf(Vec::new());
    }
    SubjectMatcher::AllOf(attributes)
}

fn agent(base: &url::Url, value: &str) -> Option<Subject> {
    let iri = resolve_term(base, value)?;
    match iri.strip_prefix(ACP_NS) {
        Some("PublicAgent") => Some(Subject::Public),
        Some("AuthenticatedAgent") => Some(Subject::Authenticated),
        Some(other) => {
            warn!("Unsupported ACP agent acp:{}", other);
            None
        }
        None => Some(Subject::Agent(iri)),
    }
}

fn parse_modes(values: &OneOrMany) -> ModeSet {
    let mut modes = ModeSet::new();
    for value in values.values() {
        match local_name(value, ACL_NS, "acl:").map(AccessMode::from_str) {
            Some(Ok(mode)) => {
                modes.insert(mode);
            }
            _ => warn!("Ignoring unknown ACP mode {}", value),
        }
    }
    modes
}
