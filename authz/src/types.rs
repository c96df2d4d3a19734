//! Core authorization types: access modes, tri-state grants, and the maps
//! that carry them between the extractor, the readers and the authorizer.
//!
//! # Security Considerations
//!
//! ## 1. Merge Precedence
//! - An explicit `Deny` from any source always wins over a `Grant`
//! - `Undefined` never grants anything; the authorizer treats it as missing
//! - Merging is associative and commutative, so reader completion order never
//!   changes an outcome
//!
//! ## 2. Completeness
//! - A [`PermissionSet`] is a total function over [`AccessMode`]; every mode
//!   has a slot, so no mode can be dropped while sets are merged
//! - Unknown modes in documents are rejected at parse time and never reach
//!   these types
//!
//! ## 3. Credentials
//! - Credentials arrive already verified from the authentication layer
//! - Absence of a WebID means anonymous access; it decides between 401 and 403

use crate::identifier::ResourceIdentifier;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// A kind of operation that requires permission.
///
/// `Control` is only produced for authorization documents (`.acl`, `.acp`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Read,
    Write,
    Append,
    Create,
    Delete,
    Control,
}

impl AccessMode {
    pub const ALL: [AccessMode; 6] = [
        AccessMode::Read,
        AccessMode::Write,
        AccessMode::Append,
        AccessMode::Create,
        AccessMode::Delete,
        AccessMode::Control,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Read => "read",
            AccessMode::Write => "write",
            AccessMode::Append => "append",
            AccessMode::Create => "create",
            AccessMode::Delete => "delete",
            AccessMode::Control => "control",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccessMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown access mode '{s}'"))
    }
}

/// The set of modes required on a single resource.
pub type ModeSet = BTreeSet<AccessMode>;

/// Tri-state permission for a single mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grant {
    Grant,
    Deny,
    #[default]
    Undefined,
}

impl Grant {
    /// `deny > grant > undefined`.
    pub fn merge(self, other: Grant) -> Grant {
        match (self, other) {
            (Grant::Deny, _) | (_, Grant::Deny) => Grant::Deny,
            (Grant::Grant, _) | (_, Grant::Grant) => Grant::Grant,
            _ => Grant::Undefined,
        }
    }

    pub fn is_granted(self) -> bool {
        self == Grant::Grant
    }

    pub fn is_defined(self) -> bool {
        self != Grant::Undefined
    }
}

/// Total function from [`AccessMode`] to [`Grant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<AccessMode, Grant>",
    into = "BTreeMap<AccessMode, Grant>"
)]
pub struct PermissionSet {
    grants: [Grant; 6],
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every mode set to `grant`.
    pub fn all(grant: Grant) -> Self {
        Self { grants: [grant; 6] }
    }

    /// The listed modes granted, everything else undefined.
    pub fn granting(modes: impl IntoIterator<Item = AccessMode>) -> Self {
        let mut set = Self::new();
        for mode in modes {
            set.set(mode, Grant::Grant);
        }
        set
    }

    /// The listed modes denied, everything else undefined.
    pub fn denying(modes: impl IntoIterator<Item = AccessMode>) -> Self {
        let mut set = Self::new();
        for mode in modes {
            set.set(mode, Grant::Deny);
        }
        set
    }

    pub fn get(&self, mode: AccessMode) -> Grant {
        self.grants[mode.index()]
    }

    pub fn set(&mut self, mode: AccessMode, grant: Grant) {
        self.grants[mode.index()] = grant;
    }

    pub fn with(mut self, mode: AccessMode, grant: Grant) -> Self {
        self.set(mode, grant);
        self
    }

    /// Mode-wise `deny > grant > undefined`.
    pub fn merge(&self, other: &PermissionSet) -> PermissionSet {
        let mut merged = *self;
        merged.merge_in(other);
        merged
    }

    pub fn merge_in(&mut self, other: &PermissionSet) {
        for mode in AccessMode::ALL {
            self.set(mode, self.get(mode).merge(other.get(mode)));
        }
    }

    /// Replaces every mode `other` grants with `Grant`, regardless of any
    /// `Deny` already present. Modes `other` leaves undefined are untouched.
    pub fn override_grants(&mut self, other: &PermissionSet) {
        for mode in AccessMode::ALL {
            if other.get(mode).is_granted() {
                self.set(mode, Grant::Grant);
            }
        }
    }

    /// Adds the grants of `other` only; its denials are ignored.
    pub fn absorb_grants(&mut self, other: &PermissionSet) {
        for mode in AccessMode::ALL {
            if other.get(mode).is_granted() {
                self.set(mode, self.get(mode).merge(Grant::Grant));
            }
        }
    }

    /// True when every mode is undefined.
    pub fn is_empty(&self) -> bool {
        self.grants.iter().all(|grant| !grant.is_defined())
    }

    /// The defined entries in mode order.
    pub fn iter(&self) -> impl Iterator<Item = (AccessMode, Grant)> + '_ {
        AccessMode::ALL
            .into_iter()
            .map(|mode| (mode, self.get(mode)))
            .filter(|(_, grant)| grant.is_defined())
    }

    pub fn granted_modes(&self) -> ModeSet {
        self.iter()
            .filter(|(_, grant)| grant.is_granted())
            .map(|(mode, _)| mode)
            .collect()
    }
}

impl From<BTreeMap<AccessMode, Grant>> for PermissionSet {
    fn from(map: BTreeMap<AccessMode, Grant>) -> Self {
        let mut set = PermissionSet::new();
        for (mode, grant) in map {
            set.set(mode, grant);
        }
        set
    }
}

impl From<PermissionSet> for BTreeMap<AccessMode, Grant> {
    fn from(set: PermissionSet) -> Self {
        set.iter().collect()
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self
            .iter()
            .map(|(mode, grant)| match grant {
                Grant::Grant => format!("+{mode}"),
                _ => format!("-{mode}"),
            })
            .collect();
        write!(f, "{{{}}}", entries.join(" "))
    }
}

/// Required modes per resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessMap(BTreeMap<ResourceIdentifier, ModeSet>);

impl AccessMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes sure `id` has an entry, possibly empty.
    pub fn ensure(&mut self, id: &ResourceIdentifier) -> &mut ModeSet {
        self.0.entry(id.clone()).or_default()
    }

    pub fn add(&mut self, id: &ResourceIdentifier, modes: impl IntoIterator<Item = AccessMode>) {
        self.ensure(id).extend(modes);
    }

    /// Replaces the modes required on `id`.
    pub fn set(&mut self, id: &ResourceIdentifier, modes: ModeSet) {
        self.0.insert(id.clone(), modes);
    }

    pub fn get(&self, id: &ResourceIdentifier) -> Option<&ModeSet> {
        self.0.get(id)
    }

    pub fn requires(&self, id: &ResourceIdentifier, mode: AccessMode) -> bool {
        self.0.get(id).is_some_and(|modes| modes.contains(&mode))
    }

    pub fn contains(&self, id: &ResourceIdentifier) -> bool {
        self.0.contains_key(id)
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceIdentifier> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceIdentifier, &ModeSet)> {
        self.0.iter()
    }

    /// Unions `other` into this map.
    pub fn extend(&mut self, other: &AccessMap) {
        for (id, modes) in other.iter() {
            self.add(id, modes.iter().copied());
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(ResourceIdentifier, ModeSet)> for AccessMap {
    fn from_iter<T: IntoIterator<Item = (ResourceIdentifier, ModeSet)>>(iter: T) -> Self {
        let mut map = AccessMap::new();
        for (id, modes) in iter {
            map.add(&id, modes);
        }
        map
    }
}

/// Granted permissions per resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMap(BTreeMap<ResourceIdentifier, PermissionSet>);

impl PermissionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The permissions on `id`; all undefined when there is no entry.
    pub fn get(&self, id: &ResourceIdentifier) -> PermissionSet {
        self.0.get(id).copied().unwrap_or_default()
    }

    pub fn entry(&self, id: &ResourceIdentifier) -> Option<&PermissionSet> {
        self.0.get(id)
    }

    pub fn entry_mut(&mut self, id: &ResourceIdentifier) -> &mut PermissionSet {
        self.0.entry(id.clone()).or_default()
    }

    pub fn insert(&mut self, id: ResourceIdentifier, set: PermissionSet) {
        self.0.insert(id, set);
    }

    pub fn remove(&mut self, id: &ResourceIdentifier) -> Option<PermissionSet> {
        self.0.remove(id)
    }

    /// Merges `set` into the entry for `id` with `deny > grant > undefined`.
    pub fn merge_entry(&mut self, id: &ResourceIdentifier, set: &PermissionSet) {
        self.entry_mut(id).merge_in(set);
    }

    /// Merges every entry of `other` into this map.
    pub fn merge(&mut self, other: &PermissionMap) {
        for (id, set) in other.iter() {
            self.merge_entry(id, set);
        }
    }

    /// Applies the grants of `other` with override semantics: a `Grant` there
    /// replaces a `Deny` here.
    pub fn override_grants(&mut self, other: &PermissionMap) {
        for (id, set) in other.iter() {
            self.entry_mut(id).override_grants(set);
        }
    }

    /// Drops every entry whose resource is not in `requested`.
    pub fn retain_requested(&mut self, requested: &AccessMap) {
        self.0.retain(|id, _| requested.contains(id));
    }

    pub fn contains(&self, id: &ResourceIdentifier) -> bool {
        self.0.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceIdentifier, &PermissionSet)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(ResourceIdentifier, PermissionSet)> for PermissionMap {
    fn from_iter<T: IntoIterator<Item = (ResourceIdentifier, PermissionSet)>>(iter: T) -> Self {
        let mut map = PermissionMap::new();
        for (id, set) in iter {
            map.merge_entry(&id, &set);
        }
        map
    }
}

/// Credentials presented with a request. All fields are optional; no WebID
/// means anonymous.
///
/// # Security Note
/// These values must come from a verified authentication layer. The core
/// trusts them as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

impl Credentials {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn agent(web_id: impl Into<String>) -> Self {
        Self {
            web_id: Some(web_id.into()),
            ..Self::default()
        }
    }

    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.web_id.is_some()
    }
}
