//! Resource identifiers and the URI conventions built on top of them.
//!
//! A [`ResourceIdentifier`] is an absolute URI. Containers end in `/`,
//! documents do not; every parent/child inference in this crate relies on that
//! convention, so identifiers are never normalized behind the caller's back.
//! The base URL is the exception: it is stored in [`canonical_iri`] form, the
//! same form document terms resolve to.

use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An absolute resource URI.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceIdentifier(String);

impl ResourceIdentifier {
    /// Wraps a URI without validating it.
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Wraps a URI after checking that it is absolute.
    pub fn parse(uri: &str) -> Result<Self> {
        url::Url::parse(uri).map_err(|e| AuthzError::InvalidIdentifier(format!("{uri}: {e}")))?;
        Ok(Self(uri.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Containers end in `/`.
    pub fn is_container(&self) -> bool {
        self.0.ends_with('/')
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceIdentifier {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

impl From<String> for ResourceIdentifier {
    fn from(uri: String) -> Self {
        Self::new(uri)
    }
}

/// The canonical serialization of an absolute IRI: lower-case scheme and
/// host, no default port, `/` as the empty path. Anything that does not
/// parse is returned unchanged.
///
/// Document terms are resolved through [`url::Url`], so identifiers and
/// credentials must go through here before they are compared with them.
pub fn canonical_iri(iri: &str) -> String {
    url::Url::parse(iri)
        .map(|url| url.to_string())
        .unwrap_or_else(|_| iri.to_string())
}

/// Container hierarchy rules relative to the server base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierStrategy {
    base_url: String,
    /// Length of the scheme and authority prefix of `base_url`.
    origin_len: usize,
}

impl IdentifierStrategy {
    /// Creates a strategy rooted at `base_url`.
    ///
    /// The base must be an absolute http(s) URL. It is stored in canonical
    /// form, and a missing trailing slash is added since the root is always
    /// a container.
    pub fn new(base_url: &str) -> Result<Self> {
        let url = url::Url::parse(base_url)
            .map_err(|e| AuthzError::InvalidIdentifier(format!("{base_url}: {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(AuthzError::InvalidIdentifier(format!(
                "{base_url}: base URL must use http or https"
            )));
        }

        if url.query().is_some() || url.fragment().is_some() {
            return Err(AuthzError::InvalidIdentifier(format!(
                "{base_url}: base URL must not carry a query or fragment"
            )));
        }

        let mut base_url = url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let origin_len = base_url.len() - url.path().len() - usize::from(!url.path().ends_with('/'));
        Ok(Self { base_url, origin_len })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn root(&self) -> ResourceIdentifier {
        ResourceIdentifier::new(self.base_url.clone())
    }

    /// True when the identifier lives on this server.
    pub fn supports(&self, id: &ResourceIdentifier) -> bool {
        id.as_str().starts_with(&self.base_url)
    }

    pub fn is_root(&self, id: &ResourceIdentifier) -> bool {
        id.as_str() == self.base_url
    }

    /// The longest strict prefix of `id` ending in `/`, never above the root.
    pub fn parent(&self, id: &ResourceIdentifier) -> Option<ResourceIdentifier> {
        if !self.supports(id) || self.is_root(id) {
            return None;
        }

        let uri = id.as_str();
        let trimmed = uri.strip_suffix('/').unwrap_or(uri);
        let slash = trimmed.rfind('/')?;
        let parent = &trimmed[..=slash];
        if parent.len() < self.base_url.len() {
            return None;
        }
        Some(ResourceIdentifier::new(parent))
    }

    /// All containers above `id`, nearest first, ending with the root.
    pub fn ancestors(&self, id: &ResourceIdentifier) -> Vec<ResourceIdentifier> {
        let mut ancestors = Vec::new();
        let mut current = self.parent(id);
        while let Some(container) = current {
            current = self.parent(&container);
            ancestors.push(container);
        }
        ancestors
    }

    /// True when `id` lies strictly below the container `ancestor`.
    pub fn is_descendant(&self, id: &ResourceIdentifier, ancestor: &ResourceIdentifier) -> bool {
        ancestor.is_container()
            && id.as_str().len() > ancestor.as_str().len()
            && id.as_str().starts_with(ancestor.as_str())
    }

    /// Path of `id` relative to the base URL, always starting with `/`.
    pub fn relative_path(&self, id: &ResourceIdentifier) -> Option<String> {
        id.as_str()
            .strip_prefix(&self.base_url)
            .map(|rest| format!("/{rest}"))
    }

    /// Path component of the base URL, e.g. `/pod/`.
    pub fn base_path(&self) -> &str {
        &self.base_url[self.origin_len..]
    }

    /// Resolves a request path, as seen on the server's origin, onto a
    /// resource identifier.
    ///
    /// With a base of `https://ex/pod/`, `/pod/a` resolves to
    /// `https://ex/pod/a` and `/pod` to the root. Paths outside the base path
    /// are rejected.
    pub fn resolve_path(&self, path: &str) -> Result<ResourceIdentifier> {
        let base_path = self.base_path();
        let rest = match path.strip_prefix(base_path) {
            Some(rest) => rest,
            None if base_path.strip_suffix('/') == Some(path) => "",
            None => {
                return Err(AuthzError::InvalidIdentifier(format!(
                    "{path} is outside {base_path}"
                )))
            }
        };
        Ok(self.resolve_relative(rest))
    }

    /// Resolves a path relative to the base URL (`a/b` or `/a/b`).
    pub fn resolve_relative(&self, path: &str) -> ResourceIdentifier {
        ResourceIdentifier::new(format!("{}{}", self.base_url, path.trim_start_matches('/')))
    }
}

/// How an auxiliary's URI is derived from its subject's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuxiliaryNaming {
    /// `https://ex/c/doc` → `https://ex/c/doc.meta`.
    #[default]
    Appended,
    /// `https://ex/c/doc` → `https://ex/c/.doc.meta`.
    Hidden,
}

/// Naming convention linking a subject resource to one of its auxiliaries.
///
/// `https://ex/c/doc` has the auxiliary `https://ex/c/doc.acl`; the container
/// `https://ex/c/` has `https://ex/c/.acl` under either naming.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuxiliaryStrategy {
    suffix: String,
    naming: AuxiliaryNaming,
}

impl AuxiliaryStrategy {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self::with_naming(suffix, AuxiliaryNaming::Appended)
    }

    /// Auxiliaries stored as dot files next to their subject.
    pub fn hidden(suffix: impl Into<String>) -> Self {
        Self::with_naming(suffix, AuxiliaryNaming::Hidden)
    }

    pub fn with_naming(suffix: impl Into<String>, naming: AuxiliaryNaming) -> Self {
        let mut suffix = suffix.into();
        if !suffix.starts_with('.') {
            suffix.insert(0, '.');
        }
        Self { suffix, naming }
    }

    /// WebACL documents.
    pub fn acl() -> Self {
        Self::new(".acl")
    }

    /// ACP access control resources.
    pub fn acp() -> Self {
        Self::new(".acp")
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn naming(&self) -> AuxiliaryNaming {
        self.naming
    }

    pub fn auxiliary_of(&self, subject: &ResourceIdentifier) -> ResourceIdentifier {
        match self.naming {
            AuxiliaryNaming::Appended => {
                ResourceIdentifier::new(format!("{}{}", subject.as_str(), self.suffix))
            }
            AuxiliaryNaming::Hidden => {
                let (dir, name) = split_last_segment(subject.as_str());
                let dot = if name.is_empty() { "" } else { "." };
                ResourceIdentifier::new(format!("{dir}{dot}{name}{}", self.suffix))
            }
        }
    }

    pub fn is_auxiliary(&self, id: &ResourceIdentifier) -> bool {
        self.subject_of(id).is_some()
    }

    pub fn subject_of(&self, id: &ResourceIdentifier) -> Option<ResourceIdentifier> {
        let stem = id.as_str().strip_suffix(&self.suffix)?;
        match self.naming {
            AuxiliaryNaming::Appended => {
                (!stem.is_empty()).then(|| ResourceIdentifier::new(stem))
            }
            AuxiliaryNaming::Hidden => {
                let (dir, name) = split_last_segment(stem);
                if dir.is_empty() {
                    return None;
                }
                if name.is_empty() {
                    return Some(ResourceIdentifier::new(dir));
                }
                let name = name.strip_prefix('.').filter(|name| !name.is_empty())?;
                Some(ResourceIdentifier::new(format!("{dir}{name}")))
            }
        }
    }
}

/// Splits `https://ex/c/doc` into `https://ex/c/` and `doc`.
fn split_last_segment(uri: &str) -> (&str, &str) {
    match uri.rfind('/') {
        Some(slash) => uri.split_at(slash + 1),
        None => ("", uri),
    }
}

/// The auxiliaries that hold authorization rules: `.acl` and `.acp`.
pub fn authorization_auxiliaries() -> Vec<AuxiliaryStrategy> {
    vec![AuxiliaryStrategy::acl(), AuxiliaryStrategy::acp()]
}

/// True when `id` is an authorization document for any of `strategies`.
pub fn is_authorization_resource(strategies: &[AuxiliaryStrategy], id: &ResourceIdentifier) -> bool {
    strategies.iter().any(|strategy| strategy.is_auxiliary(id))
}
