use super::PermissionReader;
use crate::error::Result;
use crate::identifier::{is_authorization_resource, AuxiliaryStrategy};
use crate::pods::PodRegistry;
use crate::types::{AccessMap, Credentials, Grant, PermissionMap, PermissionSet};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Grants pod owners full control over the authorization documents of their
/// pod, so an owner can always repair a broken ACL.
///
/// Only `.acl`/`.acp` resources are answered; everything else gets no entry.
pub struct OwnerReader {
    pods: Arc<dyn PodRegistry>,
    authorization_auxiliaries: Vec<AuxiliaryStrategy>,
}

impl OwnerReader {
    pub fn new(pods: Arc<dyn PodRegistry>, authorization_auxiliaries: Vec<AuxiliaryStrategy>) -> Self {
        Self {
            pods,
            authorization_auxiliaries,
        }
    }
}

#[async_trait]
impl PermissionReader for OwnerReader {
    async fn read(&self, credentials: &Credentials, requested: &AccessMap) -> Result<PermissionMap> {
        let mut result = PermissionMap::new();
        let Some(web_id) = credentials.web_id.as_deref() else {
            return Ok(result);
        };

        for id in requested.resources() {
            if !is_authorization_resource(&self.authorization_auxiliaries, id) {
                continue;
            }
            match self.pods.find_by_uri(id).await? {
                Some(pod) if pod.is_owner(web_id) => {
                    debug!("{} owns pod {}, granting control of {}", web_id, pod.id, id);
                    result.insert(id.clone(), PermissionSet::all(Grant::Grant));
                }
                _ => {}
            }
        }
        Ok(result)
    }
}
