//! Filesystem-backed resource store.
//!
//! A resource `<base_url>a/b` lives at `<data_root>/a/b`. Containers are
//! directories, and `.acl` / `.acp` documents are plain files next to the
//! resource they govern.

use async_trait::async_trait;
use authz::sources::{ResourceFetcher, ResourceSet};
use authz::{AuthzError, IdentifierStrategy, ResourceIdentifier};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FileStore {
    identifiers: IdentifierStrategy,
    root: PathBuf,
}

impl FileStore {
    pub fn new(identifiers: IdentifierStrategy, root: impl Into<PathBuf>) -> Self {
        Self {
            identifiers,
            root: root.into(),
        }
    }

    /// Maps an identifier onto the data root. Dot segments are rejected.
    fn path_of(&self, id: &ResourceIdentifier) -> authz::Result<PathBuf> {
        let relative = self
            .identifiers
            .relative_path(id)
            .ok_or_else(|| AuthzError::InvalidIdentifier(id.to_string()))?;

        let mut path = self.root.clone();
        for segment in relative.split('/').filter(|segment| !segment.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(AuthzError::InvalidIdentifier(id.to_string()));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

#[async_trait]
impl ResourceFetcher for FileStore {
    async fn get(&self, id: &ResourceIdentifier) -> authz::Result<Option<Vec<u8>>> {
        if id.is_container() {
            return Ok(None);
        }
        let path = self.path_of(id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!("Read {} ({} bytes)", path.display(), bytes.len());
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AuthzError::Fetch(format!("{}: {}", path.display(), e))),
        }
    }
}

#[async_trait]
impl ResourceSet for FileStore {
    async fn has(&self, id: &ResourceIdentifier) -> authz::Result<bool> {
        let path = self.path_of(id)?;
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if id.is_container() => Ok(metadata.is_dir()),
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AuthzError::Fetch(format!("{}: {}", path.display(), e))),
        }
    }
}
