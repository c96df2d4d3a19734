use super::PermissionReader;
use crate::error::Result;
use crate::types::{AccessMap, Credentials, Grant, PermissionMap, PermissionSet};
use async_trait::async_trait;

/// Returns the same permission set for every requested resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticReader {
    permissions: PermissionSet,
}

impl StaticReader {
    pub fn new(permissions: PermissionSet) -> Self {
        Self { permissions }
    }

    /// Grants every mode.
    pub fn allow_all() -> Self {
        Self::new(PermissionSet::all(Grant::Grant))
    }

    /// Leaves every mode undefined.
    pub fn undefined() -> Self {
        Self::new(PermissionSet::new())
    }
}

#[async_trait]
impl PermissionReader for StaticReader {
    async fn read(&self, _credentials: &Credentials, requested: &AccessMap) -> Result<PermissionMap> {
        Ok(requested
            .resources()
            .map(|id| (id.clone(), self.permissions))
            .collect())
    }
}
