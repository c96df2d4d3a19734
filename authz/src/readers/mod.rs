//! Permission readers.
//!
//! A reader answers "which modes are granted or denied on these resources
//! for these credentials". Leaf readers interpret permission documents;
//! structural readers wrap other readers and route, combine or derive
//! their answers. Every reader returns entries only for resources it was
//! asked about.
//!
//! ```text
//! UnionReader
//! ├── PathBasedReader ── /.well-known/.* ─> StaticReader(allow all)
//! │                  └── /.*            ─> AuxiliaryReader ─> ParentContainerReader ─> WebAclReader
//! └── ...
//! ```

mod acp;
mod auxiliary;
mod owner;
mod parent;
mod path_based;
mod static_reader;
mod union;
mod webacl;

pub use acp::AcpReader;
pub use auxiliary::AuxiliaryReader;
pub use owner::OwnerReader;
pub use parent::ParentContainerReader;
pub use path_based::PathBasedReader;
pub use static_reader::StaticReader;
pub use union::UnionReader;
pub use webacl::WebAclReader;

use crate::error::Result;
use crate::types::{AccessMap, Credentials, PermissionMap};
use async_trait::async_trait;

#[async_trait]
pub trait PermissionReader: Send + Sync {
    /// Reads permissions for every resource in `requested`.
    ///
    /// Only resources present in `requested` may appear in the result.
    async fn read(&self, credentials: &Credentials, requested: &AccessMap) -> Result<PermissionMap>;

    /// Short name for logs.
    fn name(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }
}
