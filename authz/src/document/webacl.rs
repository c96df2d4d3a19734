//! WebACL documents.
//!
//! ```json
//! {
//!   "authorizations": [{
//!     "id": "#owner",
//!     "agent": ["https://alice.example/profile#me"],
//!     "agentClass": ["foaf:Agent"],
//!     "agentGroup": ["https://ex/groups#friends"],
//!     "accessTo": ["./"],
//!     "default": ["./"],
//!     "mode": ["acl:Read", "acl:Write", "acl:Control"]
//!   }]
//! }
//! ```
//!
//! Relative IRIs resolve against the document URI. `acl:Write` implies
//! `Append`. WebACL has no deny, so every rule is an allow rule.

use super::{
    document_base, local_name, resolve_term, AppliesTo, AuthorizationRule, DocumentSource,
    OneOrMany, PermissionDocument, Polarity, Subject, SubjectMatcher, ACL_NS, FOAF_NS,
};
use crate::error::{AuthzError, Result};
use crate::identifier::ResourceIdentifier;
use crate::types::{AccessMode, ModeSet};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct RawAclDocument {
    #[serde(default)]
    authorizations: Vec<RawAuthorization>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAuthorization {
    #[serde(default, alias = "@id")]
    id: Option<String>,
    #[serde(default)]
    agent: OneOrMany,
    #[serde(default)]
    agent_class: OneOrMany,
    #[serde(default)]
    agent_group: OneOrMany,
    #[serde(default)]
    access_to: OneOrMany,
    #[serde(default)]
    default: OneOrMany,
    #[serde(default)]
    mode: OneOrMany,
}

/// Parses WebACL documents into allow rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebAclSource;

impl DocumentSource for WebAclSource {
    fn parse(
        &self,
        document: &ResourceIdentifier,
        _subject: &ResourceIdentifier,
        body: &[u8],
    ) -> Result<PermissionDocument> {
        let raw: RawAclDocument =
            serde_json::from_slice(body).map_err(|e| AuthzError::malformed(document.as_str(), e))?;
        let base = document_base(document)?;

        let rules = raw
            .authorizations
            .iter()
            .filter_map(|authorization| convert(&base, document, authorization))
            .collect();
        Ok(PermissionDocument::WebAcl { rules })
    }
}

fn convert(
    base: &url::Url,
    document: &ResourceIdentifier,
    raw: &RawAuthorization,
) -> Option<AuthorizationRule> {
    let label = raw.id.as_deref().unwrap_or("<anonymous>");

    let modes = parse_modes(&raw.mode);
    if modes.is_empty() {
        warn!("Skipping authorization {} in {}: no known modes", label, document);
        return None;
    }

    let mut applies_to = BTreeSet::new();
    for target in raw.access_to.values() {
        if let Some(iri) = resolve_term(base, target) {
            applies_to.insert(AppliesTo::AccessTo(iri.into()));
        }
    }
    for target in raw.default.values() {
        if let Some(iri) = resolve_term(base, target) {
            applies_to.insert(AppliesTo::Default(iri.into()));
        }
    }
    if applies_to.is_empty() {
        warn!("Skipping authorization {} in {}: no accessTo or default", label, document);
        return None;
    }

    let mut subjects = Vec::new();
    for agent in raw.agent.values() {
        if let Some(iri) = resolve_term(base, agent) {
            subjects.push(Subject::Agent(iri));
        }
    }
    for class in raw.agent_class.values() {
        subjects.extend(agent_class(base, class));
    }
    for group in raw.agent_group.values() {
        if let Some(iri) = resolve_term(base, group) {
            subjects.push(Subject::AgentGroup(iri));
        }
    }
    if subjects.is_empty() {
        warn!("Skipping authorization {} in {}: no agents", label, document);
        return None;
    }

    Some(AuthorizationRule {
        id: raw.id.clone(),
        subjects: SubjectMatcher::any_of(subjects),
        modes,
        applies_to,
        polarity: Polarity::Allow,
    })
}

fn agent_class(base: &url::Url, class: &str) -> Option<Subject> {
    let iri = resolve_term(base, class)?;
    if iri == format!("{FOAF_NS}Agent") {
        Some(Subject::Public)
    } else if iri == format!("{ACL_NS}AuthenticatedAgent") {
        Some(Subject::Authenticated)
    } else {
        Some(Subject::AgentClass(iri))
    }
}

fn parse_modes(values: &OneOrMany) -> ModeSet {
    let mut modes = ModeSet::new();
    for value in values.values() {
        match local_name(value, ACL_NS, "acl:") {
            Some("Read") => {
                modes.insert(AccessMode::Read);
            }
            Some("Write") => {
                modes.insert(AccessMode::Write);
                modes.insert(AccessMode::Append);
            }
            Some("Append") => {
                modes.insert(AccessMode::Append);
            }
            Some("Control") => {
                modes.insert(AccessMode::Control);
            }
            _ => warn!("Ignoring unknown WebACL mode {}", value),
        }
    }
    modes
}
