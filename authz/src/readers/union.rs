use super::PermissionReader;
use crate::error::Result;
use crate::types::{AccessMap, Credentials, PermissionMap};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs every child reader concurrently and merges the results with
/// `deny > grant > undefined`.
///
/// A failing child is logged and contributes nothing; the union itself
/// never fails.
pub struct UnionReader {
    readers: Vec<Arc<dyn PermissionReader>>,
}

impl UnionReader {
    pub fn new(readers: Vec<Arc<dyn PermissionReader>>) -> Self {
        Self { readers }
    }
}

#[async_trait]
impl PermissionReader for UnionReader {
    async fn read(&self, credentials: &Credentials, requested: &AccessMap) -> Result<PermissionMap> {
        let results = join_all(
            self.readers
                .iter()
                .map(|reader| reader.read(credentials, requested)),
        )
        .await;

        let mut merged = PermissionMap::new();
        for (reader, result) in self.readers.iter().zip(results) {
            match result {
                Ok(map) => {
                    debug!("{} answered for {} resources", reader.name(), map.len());
                    merged.merge(&map);
                }
                Err(e) => warn!("{} failed, ignoring its answer: {}", reader.name(), e),
            }
        }
        merged.retain_requested(requested);
        Ok(merged)
    }
}
