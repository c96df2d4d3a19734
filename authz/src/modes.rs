//! Derives the access modes a request needs on each resource it touches.
//!
//! The rules depend on the method, on whether the target already exists and,
//! for PATCH, on the normalized shape of the patch body. Targets that are
//! authorization documents (`.acl`, `.acp`) only ever require `Control`.

use crate::error::{AuthzError, Result};
use crate::identifier::{is_authorization_resource, AuxiliaryStrategy, IdentifierStrategy, ResourceIdentifier};
use crate::sources::ResourceSet;
use crate::types::{AccessMap, AccessMode, ModeSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// HTTP methods the extractor knows how to map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Options,
    Put,
    Post,
    Delete,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            "PUT" => Ok(Method::Put),
            "POST" => Ok(Method::Post),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            _ => Err(AuthzError::UnsupportedMethod(s.to_string())),
        }
    }
}

/// Normalized shape of an N3 Patch or SPARQL Update body.
///
/// Entries are opaque pattern strings; only whether each set is empty matters
/// for authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchBody {
    #[serde(default)]
    pub conditions: BTreeSet<String>,
    #[serde(default)]
    pub inserts: BTreeSet<String>,
    #[serde(default)]
    pub deletes: BTreeSet<String>,
}

impl PatchBody {
    pub fn is_nop(&self) -> bool {
        self.conditions.is_empty() && self.inserts.is_empty() && self.deletes.is_empty()
    }
}

/// The request shape the authorization core consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub method: Method,
    pub target: ResourceIdentifier,
    pub content_type: Option<String>,
    pub patch: Option<PatchBody>,
}

impl Operation {
    pub fn new(method: Method, target: impl Into<ResourceIdentifier>) -> Self {
        Self {
            method,
            target: target.into(),
            content_type: None,
            patch: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_patch(mut self, patch: PatchBody) -> Self {
        self.patch = Some(patch);
        self
    }
}

/// Computes the required [`AccessMap`] for an [`Operation`].
#[derive(Clone)]
pub struct ModesExtractor {
    identifiers: IdentifierStrategy,
    resources: Arc<dyn ResourceSet>,
    authorization_auxiliaries: Vec<AuxiliaryStrategy>,
}

impl ModesExtractor {
    pub fn new(
        identifiers: IdentifierStrategy,
        resources: Arc<dyn ResourceSet>,
        authorization_auxiliaries: Vec<AuxiliaryStrategy>,
    ) -> Self {
        Self {
            identifiers,
            resources,
            authorization_auxiliaries,
        }
    }

    /// The target always has an entry; its parent may have one.
    pub async fn extract(&self, operation: &Operation) -> Result<AccessMap> {
        let target = &operation.target;
        let mut target_modes = ModeSet::new();
        let mut parent_modes = ModeSet::new();

        match operation.method {
            Method::Get | Method::Head | Method::Options => {
                target_modes.insert(AccessMode::Read);
            }
            Method::Post => {
                target_modes.insert(AccessMode::Append);
            }
            Method::Put => {
                if self.resources.has(target).await? {
                    target_modes.insert(AccessMode::Write);
                } else {
                    target_modes.extend([AccessMode::Append, AccessMode::Create]);
                    parent_modes.insert(AccessMode::Append);
                }
            }
            Method::Delete => {
                target_modes.insert(AccessMode::Delete);
                if !self.identifiers.is_root(target) {
                    if self.resources.has(target).await? {
                        target_modes.insert(AccessMode::Write);
                        parent_modes.insert(AccessMode::Write);
                    } else {
                        parent_modes.extend([AccessMode::Read, AccessMode::Write]);
                    }
                }
                if target.is_container() {
                    target_modes.insert(AccessMode::Read);
                }
            }
            Method::Patch => {
                self.extract_patch(operation, &mut target_modes, &mut parent_modes)
                    .await?;
            }
        }

        if is_authorization_resource(&self.authorization_auxiliaries, target) {
            target_modes = ModeSet::from([AccessMode::Control]);
        }

        let mut required = AccessMap::new();
        required.set(target, target_modes);
        if !parent_modes.is_empty() {
            if let Some(parent) = self.identifiers.parent(target) {
                required.add(&parent, parent_modes);
            }
        }

        debug!(
            "Required modes for {} {}: {:?}",
            operation.method, target, required
        );
        Ok(required)
    }

    async fn extract_patch(
        &self,
        operation: &Operation,
        target_modes: &mut ModeSet,
        parent_modes: &mut ModeSet,
    ) -> Result<()> {
        // An unclassified patch is treated as one that does everything.
        let (conditions, inserts, deletes) = match &operation.patch {
            Some(patch) => (
                !patch.conditions.is_empty(),
                !patch.inserts.is_empty(),
                !patch.deletes.is_empty(),
            ),
            None => (true, true, true),
        };

        if conditions {
            target_modes.insert(AccessMode::Read);
        }
        if inserts {
            target_modes.insert(AccessMode::Append);
            if !self.resources.has(&operation.target).await? {
                target_modes.insert(AccessMode::Create);
                parent_modes.insert(AccessMode::Append);
            }
        }
        if deletes {
            target_modes.extend([AccessMode::Read, AccessMode::Write]);
        }
        Ok(())
    }
}
