use super::PermissionReader;
use crate::error::Result;
use crate::identifier::{AuxiliaryStrategy, ResourceIdentifier};
use crate::types::{AccessMap, Credentials, ModeSet, PermissionMap};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

/// Lets the permissions of a resource's auxiliaries add grants to the
/// resource itself.
///
/// For every requested resource and configured suffix, the wrapped reader
/// is asked about the auxiliary with the same modes. Grants found there are
/// folded into the resource's entry; denials are not. Failures on
/// auxiliaries are logged and skipped; a failure on the original request
/// fails the read.
pub struct AuxiliaryReader {
    reader: Arc<dyn PermissionReader>,
    auxiliaries: Vec<AuxiliaryStrategy>,
}

impl AuxiliaryReader {
    pub fn new(reader: Arc<dyn PermissionReader>, auxiliaries: Vec<AuxiliaryStrategy>) -> Self {
        Self { reader, auxiliaries }
    }

    async fn read_auxiliary(
        &self,
        credentials: &Credentials,
        subject: ResourceIdentifier,
        auxiliary: ResourceIdentifier,
        modes: ModeSet,
    ) -> (ResourceIdentifier, ResourceIdentifier, Result<PermissionMap>) {
        let request: AccessMap = [(auxiliary.clone(), modes)].into_iter().collect();
        let result = self.reader.read(credentials, &request).await;
        (subject, auxiliary, result)
    }
}

#[async_trait]
impl PermissionReader for AuxiliaryReader {
    async fn read(&self, credentials: &Credentials, requested: &AccessMap) -> Result<PermissionMap> {
        let mut result = self.reader.read(credentials, requested).await?;

        let mut lookups = Vec::new();
        for (id, modes) in requested.iter() {
            for strategy in &self.auxiliaries {
                if strategy.is_auxiliary(id) {
                    continue;
                }
                lookups.push(self.read_auxiliary(
                    credentials,
                    id.clone(),
                    strategy.auxiliary_of(id),
                    modes.clone(),
                ));
            }
        }

        for (subject, auxiliary, answer) in join_all(lookups).await {
            match answer {
                Ok(map) => {
                    let grants = map.get(&auxiliary);
                    if !grants.is_empty() {
                        debug!("{} contributes {} to {}", auxiliary, grants, subject);
                    }
                    result.entry_mut(&subject).absorb_grants(&grants);
                }
                Err(e) => warn!("Skipping auxiliary {} of {}: {}", auxiliary, subject, e),
            }
        }

        result.retain_requested(requested);
        Ok(result)
    }
}
