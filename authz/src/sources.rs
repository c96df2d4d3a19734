//! Interfaces the core consumes from the rest of the server.
//!
//! Every call here may block on I/O. Implementations must be safe to share
//! between concurrent authorizations; the core never locks around them.

use crate::error::Result;
use crate::identifier::ResourceIdentifier;
use async_trait::async_trait;

/// Fetches raw permission documents.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// `Ok(None)` means the document does not exist, which is normal for
    /// auxiliary resources.
    async fn get(&self, id: &ResourceIdentifier) -> Result<Option<Vec<u8>>>;
}

/// Resource-existence oracle.
#[async_trait]
pub trait ResourceSet: Send + Sync {
    async fn has(&self, id: &ResourceIdentifier) -> Result<bool>;
}

/// Resolves WebACL `agentGroup` and custom `agentClass` membership.
#[async_trait]
pub trait GroupMembership: Send + Sync {
    async fn is_member(&self, web_id: &str, group: &str) -> Result<bool>;
}

/// A resolver that knows no groups.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGroups;

#[async_trait]
impl GroupMembership for NoGroups {
    async fn is_member(&self, _web_id: &str, _group: &str) -> Result<bool> {
        Ok(false)
    }
}
