//! Permission documents and the uniform rule model they parse into.
//!
//! Both WebACL documents and ACP access control resources end up as a list of
//! [`AuthorizationRule`]s. The readers only ever look at rules, never at the
//! raw documents.

pub mod acp;
pub mod webacl;

use crate::error::{AuthzError, Result};
use crate::identifier::{canonical_iri, IdentifierStrategy, ResourceIdentifier};
use crate::sources::{GroupMembership, ResourceFetcher};
use crate::types::{AccessMode, Credentials, Grant, ModeSet, PermissionSet};
use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

pub use acp::AcpSource;
pub use webacl::WebAclSource;

pub(crate) const ACL_NS: &str = "http://www.w3.org/ns/auth/acl#";
pub(crate) const FOAF_NS: &str = "http://xmlns.com/foaf/0.1/";
pub(crate) const ACP_NS: &str = "http://www.w3.org/ns/solid/acp#";

/// Who a rule is about.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Subject {
    /// Everyone, authenticated or not.
    Public,
    /// Any agent presenting a WebID.
    Authenticated,
    Agent(String),
    /// A custom agent class, resolved like a group.
    AgentClass(String),
    AgentGroup(String),
    Client(String),
    Issuer(String),
}

impl Subject {
    fn matches(&self, context: &SubjectContext) -> bool {
        let credentials = &context.credentials;
        match self {
            Subject::Public => true,
            Subject::Authenticated => credentials.is_authenticated(),
            Subject::Agent(web_id) => credentials.web_id.as_deref() == Some(web_id.as_str()),
            Subject::AgentClass(group) | Subject::AgentGroup(group) => {
                credentials.is_authenticated() && context.groups.contains(group)
            }
            Subject::Client(client) => credentials.client_id.as_deref() == Some(client.as_str()),
            Subject::Issuer(issuer) => credentials.issuer.as_deref() == Some(issuer.as_str()),
        }
    }

    fn group(&self) -> Option<&str> {
        match self {
            Subject::AgentClass(group) | Subject::AgentGroup(group) => Some(group),
            _ => None,
        }
    }
}

/// Boolean combination of subjects.
///
/// WebACL rules are a flat `AnyOf`; ACP policies use all four forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectMatcher {
    Subject(Subject),
    /// Satisfied by at least one member; an empty list is never satisfied.
    AnyOf(Vec<SubjectMatcher>),
    /// Satisfied when every member is; an empty list is always satisfied.
    AllOf(Vec<SubjectMatcher>),
    Not(Box<SubjectMatcher>),
}

impl SubjectMatcher {
    pub fn any_of(subjects: impl IntoIterator<Item = Subject>) -> Self {
        SubjectMatcher::AnyOf(subjects.into_iter().map(SubjectMatcher::Subject).collect())
    }

    pub fn matches(&self, context: &SubjectContext) -> bool {
        match self {
            SubjectMatcher::Subject(subject) => subject.matches(context),
            SubjectMatcher::AnyOf(matchers) => matchers.iter().any(|m| m.matches(context)),
            SubjectMatcher::AllOf(matchers) => matchers.iter().all(|m| m.matches(context)),
            SubjectMatcher::Not(matcher) => !matcher.matches(context),
        }
    }

    /// Group IRIs whose membership decides this matcher.
    pub fn groups(&self) -> BTreeSet<String> {
        let mut groups = BTreeSet::new();
        self.collect_groups(&mut groups);
        groups
    }

    fn collect_groups(&self, groups: &mut BTreeSet<String>) {
        match self {
            SubjectMatcher::Subject(subject) => {
                if let Some(group) = subject.group() {
                    groups.insert(group.to_string());
                }
            }
            SubjectMatcher::AnyOf(matchers) | SubjectMatcher::AllOf(matchers) => {
                for matcher in matchers {
                    matcher.collect_groups(groups);
                }
            }
            SubjectMatcher::Not(matcher) => matcher.collect_groups(groups),
        }
    }
}

/// Which resources a rule governs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AppliesTo {
    /// Exactly this resource.
    AccessTo(ResourceIdentifier),
    /// Every descendant of this container.
    Default(ResourceIdentifier),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    Allow,
    Deny,
}

/// A single parsed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRule {
    pub id: Option<String>,
    pub subjects: SubjectMatcher,
    pub modes: ModeSet,
    pub applies_to: BTreeSet<AppliesTo>,
    pub polarity: Polarity,
}

impl AuthorizationRule {
    pub fn applies_to_resource(&self, id: &ResourceIdentifier, identifiers: &IdentifierStrategy) -> bool {
        self.applies_to.iter().any(|target| match target {
            AppliesTo::AccessTo(resource) => resource == id,
            AppliesTo::Default(container) => identifiers.is_descendant(id, container),
        })
    }

    /// The permissions this rule contributes when it applies.
    pub fn contribution(&self) -> PermissionSet {
        let grant = match self.polarity {
            Polarity::Allow => Grant::Grant,
            Polarity::Deny => Grant::Deny,
        };
        let mut set = PermissionSet::new();
        for mode in &self.modes {
            set.set(*mode, grant);
        }
        set
    }
}

/// A parsed permission document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionDocument {
    WebAcl { rules: Vec<AuthorizationRule> },
    Acp { rules: Vec<AuthorizationRule> },
}

impl PermissionDocument {
    pub fn rules(&self) -> &[AuthorizationRule] {
        match self {
            PermissionDocument::WebAcl { rules } | PermissionDocument::Acp { rules } => rules,
        }
    }

    pub fn into_rules(self) -> Vec<AuthorizationRule> {
        match self {
            PermissionDocument::WebAcl { rules } | PermissionDocument::Acp { rules } => rules,
        }
    }
}

/// Turns raw document bytes into rules.
pub trait DocumentSource: Send + Sync {
    /// `document` is the URI the bytes came from, `subject` the resource the
    /// document controls.
    fn parse(
        &self,
        document: &ResourceIdentifier,
        subject: &ResourceIdentifier,
        body: &[u8],
    ) -> Result<PermissionDocument>;
}

/// Fetches and parses a document. `Ok(None)` when it does not exist.
pub async fn load_document(
    fetcher: &dyn ResourceFetcher,
    source: &dyn DocumentSource,
    document: &ResourceIdentifier,
    subject: &ResourceIdentifier,
) -> Result<Option<PermissionDocument>> {
    match fetcher.get(document).await? {
        Some(body) => {
            let parsed = source.parse(document, subject, &body)?;
            debug!("Loaded {} with {} rules", document, parsed.rules().len());
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Credentials plus the groups the agent was found to belong to.
#[derive(Debug, Clone, Default)]
pub struct SubjectContext {
    pub credentials: Credentials,
    pub groups: HashSet<String>,
}

impl SubjectContext {
    /// Resolves membership of every group the rules mention, once each.
    pub async fn resolve<'a>(
        credentials: &Credentials,
        rules: impl IntoIterator<Item = &'a AuthorizationRule>,
        membership: &dyn GroupMembership,
    ) -> Result<Self> {
        let credentials = Credentials {
            web_id: credentials.web_id.as_deref().map(canonical_iri),
            client_id: credentials.client_id.as_deref().map(canonical_iri),
            issuer: credentials.issuer.as_deref().map(canonical_iri),
        };
        let mut context = SubjectContext {
            credentials,
            groups: HashSet::new(),
        };
        let Some(web_id) = context.credentials.web_id.clone() else {
            return Ok(context);
        };

        let mut groups = BTreeSet::new();
        for rule in rules {
            groups.extend(rule.subjects.groups());
        }
        for group in groups {
            let member = membership
                .is_member(&web_id, &group)
                .await
                .map_err(|e| AuthzError::GroupResolution(format!("{group}: {e}")))?;
            if member {
                context.groups.insert(group);
            }
        }
        Ok(context)
    }
}

/// Folds every applicable rule for `target` into one permission set.
pub fn evaluate_rules<'a>(
    rules: impl IntoIterator<Item = &'a AuthorizationRule>,
    target: &ResourceIdentifier,
    context: &SubjectContext,
    identifiers: &IdentifierStrategy,
) -> PermissionSet {
    let mut set = PermissionSet::new();
    for rule in rules {
        if rule.applies_to_resource(target, identifiers) && rule.subjects.matches(context) {
            set.merge_in(&rule.contribution());
        }
    }
    set
}

/// Permissions on an authorization document derived from its subject:
/// `Control` on the subject decides Read, Write, Append and Control on the
/// document.
pub fn control_document_permissions(subject: &PermissionSet) -> PermissionSet {
    let control = subject.get(AccessMode::Control);
    let mut set = PermissionSet::new();
    if control.is_defined() {
        for mode in [
            AccessMode::Read,
            AccessMode::Write,
            AccessMode::Append,
            AccessMode::Control,
        ] {
            set.set(mode, control);
        }
    }
    set
}

/// A JSON value that may be a single string or a list of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl OneOrMany {
    pub(crate) fn values(&self) -> Vec<&str> {
        match self {
            OneOrMany::One(value) => vec![value.as_str()],
            OneOrMany::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

/// Expands `acl:`, `foaf:` and `acp:` prefixed names to full IRIs and
/// resolves everything else against the document URI.
pub(crate) fn resolve_term(base: &url::Url, term: &str) -> Option<String> {
    for (prefix, namespace) in [("acl:", ACL_NS), ("foaf:", FOAF_NS), ("acp:", ACP_NS)] {
        if let Some(local) = term.strip_prefix(prefix) {
            return Some(format!("{namespace}{local}"));
        }
    }
    base.join(term).ok().map(|url| url.to_string())
}

/// The local name of `term` inside `namespace`, accepting bare local names.
pub(crate) fn local_name<'a>(term: &'a str, namespace: &str, prefix: &str) -> Option<&'a str> {
    if let Some(local) = term.strip_prefix(namespace) {
        return Some(local);
    }
    if let Some(local) = term.strip_prefix(prefix) {
        return Some(local);
    }
    (!term.contains(':')).then_some(term)
}

pub(crate) fn document_base(document: &ResourceIdentifier) -> Result<url::Url> {
    url::Url::parse(document.as_str()).map_err(|e| AuthzError::malformed(document.as_str(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(credentials: Credentials, groups: &[&str]) -> SubjectContext {
        SubjectContext {
            credentials,
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    #[test]
    fn test_subject_matching() {
        let anonymous = context(Credentials::anonymous(), &[]);
        let alice = context(Credentials::agent("https://alice/#me"), &["https://ex/g#friends"]);

        assert!(Subject::Public.matches(&anonymous));
        assert!(!Subject::Authenticated.matches(&anonymous));
        assert!(Subject::Authenticated.matches(&alice));
        assert!(Subject::Agent("https://alice/#me".into()).matches(&alice));
        assert!(!Subject::Agent("https://bob/#me".into()).matches(&alice));
        assert!(Subject::AgentGroup("https://ex/g#friends".into()).matches(&alice));
        assert!(!Subject::AgentGroup("https://ex/g#friends".into()).matches(&anonymous));
    }

    #[test]
    fn test_matcher_combinators() {
        let alice = context(
            Credentials::agent("https://alice/#me").with_client("https://app/"),
            &[],
        );
        let is_alice = SubjectMatcher::Subject(Subject::Agent("https://alice/#me".into()));
        let via_app = SubjectMatcher::Subject(Subject::Client("https://app/".into()));
        let via_other = SubjectMatcher::Subject(Subject::Client("https://other/".into()));

        assert!(SubjectMatcher::AllOf(vec![is_alice.clone(), via_app.clone()]).matches(&alice));
        assert!(!SubjectMatcher::AllOf(vec![is_alice.clone(), via_other.clone()]).matches(&alice));
        assert!(SubjectMatcher::AnyOf(vec![via_other.clone(), is_alice]).matches(&alice));
        assert!(!SubjectMatcher::AnyOf(vec![]).matches(&alice));
        assert!(SubjectMatcher::AllOf(vec![]).matches(&alice));
        assert!(SubjectMatcher::Not(Box::new(via_other)).matches(&alice));
    }

    #[test]
    fn test_rule_applies_to() {
        let identifiers = IdentifierStrategy::new("https://ex/").unwrap();
        let rule = AuthorizationRule {
            id: None,
            subjects: SubjectMatcher::any_of([Subject::Public]),
            modes: ModeSet::from([AccessMode::Read]),
            applies_to: BTreeSet::from([
                AppliesTo::AccessTo("https://ex/c/".into()),
                AppliesTo::Default("https://ex/c/".into()),
            ]),
            polarity: Polarity::Allow,
        };
        assert!(rule.applies_to_resource(&"https://ex/c/".into(), &identifiers));
        assert!(rule.applies_to_resource(&"https://ex/c/a/b".into(), &identifiers));
        assert!(!rule.applies_to_resource(&"https://ex/d".into(), &identifiers));
    }

    #[test]
    fn test_control_document_permissions() {
        let subject = PermissionSet::granting([AccessMode::Control, AccessMode::Read]);
        let document = control_document_permissions(&subject);
        assert_eq!(document.get(AccessMode::Write), Grant::Grant);
        assert_eq!(document.get(AccessMode::Delete), Grant::Undefined);

        let none = control_document_permissions(&PermissionSet::granting([AccessMode::Read]));
        assert!(none.is_empty());
    }

    #[test]
    fn test_term_resolution() {
        let base = url::Url::parse("https://ex/c/.acl").unwrap();
        assert_eq!(
            resolve_term(&base, "foaf:Agent").as_deref(),
            Some("http://xmlns.com/foaf/0.1/Agent")
        );
        assert_eq!(resolve_term(&base, "./res").as_deref(), Some("https://ex/c/res"));
        assert_eq!(resolve_term(&base, "./").as_deref(), Some("https://ex/c/"));
        assert_eq!(local_name("acl:Read", ACL_NS, "acl:"), Some("Read"));
        assert_eq!(local_name("Write", ACL_NS, "acl:"), Some("Write"));
        assert_eq!(
            local_name("http://www.w3.org/ns/auth/acl#Append", ACL_NS, "acl:"),
            Some("Append")
        );
        assert_eq!(local_name("https://other/#Read", ACL_NS, "acl:"), None);
    }
}
