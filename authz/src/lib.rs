//! Authorization decision core for a Solid-style pod server.
//!
//! Given an [`Operation`] (method, target, optional patch shape) and the
//! verified [`Credentials`] of the caller, this crate decides whether the
//! operation may proceed. Permissions come from WebACL documents or ACP
//! access control resources stored next to the resources they govern.
//!
//! # Architecture Overview
//!
//! The authorization flow follows this pattern:
//!
//! 1. **Request arrives** at the HTTP layer (see the `api` crate)
//! 2. **Authentication** verifies the caller and produces [`Credentials`]
//! 3. **[`ModesExtractor`]** computes the required [`AccessMap`]
//! 4. **Readers** compute the granted [`PermissionMap`] through a composition
//!    of [`PermissionReader`]s
//! 5. **[`Authorizer`]** compares the two: Allow, Unauthenticated or Forbidden
//!
//! # Reader Composition
//!
//! Readers form a tree built from [`config::AuthorizationConfig`]:
//!
//! - **Leaf readers** interpret documents: [`readers::WebAclReader`],
//!   [`readers::AcpReader`], [`readers::StaticReader`]
//! - **Structural readers** wrap other readers:
//!   [`readers::AuxiliaryReader`], [`readers::ParentContainerReader`],
//!   [`readers::PathBasedReader`], [`readers::UnionReader`]
//! - **Owner override**: [`readers::OwnerReader`] runs after the tree and
//!   lets pod owners control their authorization documents
//!
//! # Security Architecture
//!
//! See `types.rs` for the merge and completeness rules every reader relies
//! on, and `error.rs` for how failures are kept apart from denials.

pub mod authorizer;
pub mod config;
pub mod document;
pub mod error;
pub mod identifier;
pub mod memory;
pub mod modes;
pub mod pods;
pub mod readers;
pub mod sources;
pub mod types;

pub use authorizer::{Authorization, Authorizer, Decision, Violation};
pub use config::{AuthorizationConfig, Collaborators, ReaderConfig};
pub use error::{AuthzError, Result};
pub use identifier::{AuxiliaryNaming, AuxiliaryStrategy, IdentifierStrategy, ResourceIdentifier};
pub use modes::{Method, ModesExtractor, Operation, PatchBody};
pub use readers::PermissionReader;
pub use types::{AccessMap, AccessMode, Credentials, Grant, ModeSet, PermissionMap, PermissionSet};
