use super::file_store::FileStore;
use anyhow::{Context, Result};
use authz::memory::{InMemoryPodRegistry, StaticGroups};
use authz::pods::Pod;
use authz::{AuthorizationConfig, Authorizer, Collaborators, IdentifierStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Contents of `podctl.yaml`: the authorization config plus the data the
/// CLI serves it from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(flatten)]
    pub authorization: AuthorizationConfig,

    /// Directory holding the pod's resources. Relative paths are resolved
    /// against the config file's directory.
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,

    /// Group IRI → member WebIDs.
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub pods: Vec<Pod>,
}

fn default_data_root() -> PathBuf {
    PathBuf::from("data")
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        let mut settings: Settings = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file {}", path.display()))?;

        settings.authorization.validate()?;

        if settings.data_root.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            settings.data_root = base.join(&settings.data_root);
        }
        debug!("Loaded {} (data root {})", path.display(), settings.data_root.display());
        Ok(settings)
    }

    pub fn identifiers(&self) -> Result<IdentifierStrategy> {
        Ok(IdentifierStrategy::new(&self.authorization.base_url)?)
    }

    pub fn collaborators(&self) -> Result<Collaborators> {
        let store = Arc::new(FileStore::new(self.identifiers()?, &self.data_root));
        let groups: StaticGroups = self.groups.clone().into_iter().collect();
        Ok(Collaborators {
            fetcher: store.clone(),
            resources: store,
            groups: Arc::new(groups),
            pods: Arc::new(InMemoryPodRegistry::new(self.pods.clone())),
        })
    }

    pub fn authorizer(&self) -> Result<Authorizer> {
        Ok(self.authorization.build(&self.collaborators()?)?)
    }
}
