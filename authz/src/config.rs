//! YAML configuration for the reader composition.
//!
//! ```yaml
//! base_url: https://pod.example/
//! deadline_ms: 2000
//! owner_override: true
//! reader:
//!   type: union
//!   readers:
//!     - type: path_based
//!       routes:
//!         - pattern: '^/\.well-known/'
//!           reader: { type: static, grant: all }
//!         - pattern: '.*'
//!           reader:
//!             type: parent_container
//!             reader: { type: web_acl }
//!     - type: acp
//! ```

use crate::authorizer::Authorizer;
use crate::error::{AuthzError, Result};
use crate::identifier::{
    authorization_auxiliaries, AuxiliaryNaming, AuxiliaryStrategy, IdentifierStrategy,
};
use crate::memory::InMemoryStore;
use crate::modes::ModesExtractor;
use crate::pods::PodRegistry;
use crate::readers::{
    AcpReader, AuxiliaryReader, OwnerReader, ParentContainerReader, PathBasedReader,
    PermissionReader, StaticReader, UnionReader, WebAclReader,
};
use crate::sources::{GroupMembership, ResourceFetcher, ResourceSet};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Top-level authorization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationConfig {
    /// Base URL of the server; must end in `/`.
    pub base_url: String,
    /// Upper bound on a single authorization, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
    /// Whether pod owners always control their authorization documents.
    #[serde(default = "default_owner_override")]
    pub owner_override: bool,
    /// The reader composition.
    #[serde(default = "default_reader")]
    pub reader: ReaderConfig,
}

fn default_owner_override() -> bool {
    true
}

fn default_reader() -> ReaderConfig {
    ReaderConfig::WebAcl
}

/// One node of the reader tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReaderConfig {
    Union {
        readers: Vec<ReaderConfig>,
    },
    PathBased {
        routes: Vec<RouteConfig>,
    },
    Auxiliary {
        suffixes: Vec<String>,
        #[serde(default)]
        naming: AuxiliaryNaming,
        reader: Box<ReaderConfig>,
    },
    ParentContainer {
        reader: Box<ReaderConfig>,
    },
    WebAcl,
    Acp,
    Static {
        grant: StaticGrant,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Regex matched against the path relative to the base URL.
    pub pattern: String,
    pub reader: ReaderConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaticGrant {
    All,
    None,
}

/// The server-side collaborators readers and the extractor need.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn ResourceFetcher>,
    pub resources: Arc<dyn ResourceSet>,
    pub groups: Arc<dyn GroupMembership>,
    pub pods: Arc<dyn PodRegistry>,
}

impl Collaborators {
    /// Uses one in-memory store as both fetcher and existence oracle.
    pub fn in_memory(
        store: InMemoryStore,
        groups: Arc<dyn GroupMembership>,
        pods: Arc<dyn PodRegistry>,
    ) -> Self {
        let store = Arc::new(store);
        Self {
            fetcher: store.clone(),
            resources: store,
            groups,
            pods,
        }
    }
}

impl AuthorizationConfig {
    pub fn new(base_url: impl Into<String>, reader: ReaderConfig) -> Self {
        Self {
            base_url: base_url.into(),
            deadline_ms: None,
            owner_override: true,
            reader,
        }
    }

    /// Parse from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| AuthzError::Configuration(e.to_string()))
    }

    /// Load from file path
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AuthzError::Configuration(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| AuthzError::Configuration(e.to_string()))
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.base_url.ends_with('/') {
            return Err(AuthzError::Configuration(format!(
                "base_url must end with '/': {}",
                self.base_url
            )));
        }
        IdentifierStrategy::new(&self.base_url)
            .map_err(|e| AuthzError::Configuration(format!("invalid base_url: {e}")))?;
        if self.deadline_ms == Some(0) {
            return Err(AuthzError::Configuration("deadline_ms must be positive".to_string()));
        }
        self.reader.validate()
    }

    /// Validates the configuration and wires up the [`Authorizer`].
    pub fn build(&self, collaborators: &Collaborators) -> Result<Authorizer> {
        self.validate()?;
        let identifiers = IdentifierStrategy::new(&self.base_url)?;
        let reader = self.reader.build(&identifiers, collaborators)?;
        let extractor = ModesExtractor::new(
            identifiers,
            collaborators.resources.clone(),
            authorization_auxiliaries(),
        );

        let mut authorizer = Authorizer::new(extractor, reader);
        if self.owner_override {
            authorizer = authorizer.with_owner_override(OwnerReader::new(
                collaborators.pods.clone(),
                authorization_auxiliaries(),
            ));
        }
        info!(
            "Authorization configured for {} (owner override: {})",
            self.base_url, self.owner_override
        );
        Ok(authorizer)
    }
}

impl ReaderConfig {
    pub fn validate(&self) -> Result<()> {
        match self {
            ReaderConfig::Union { readers } => {
                if readers.is_empty() {
                    return Err(AuthzError::Configuration("union needs at least one reader".to_string()));
                }
                readers.iter().try_for_each(ReaderConfig::validate)
            }
            ReaderConfig::PathBased { routes } => {
                for route in routes {
                    Regex::new(&route.pattern).map_err(|e| {
                        AuthzError::Configuration(format!("invalid pattern {}: {}", route.pattern, e))
                    })?;
                    route.reader.validate()?;
                }
                Ok(())
            }
            ReaderConfig::Auxiliary { suffixes, reader, .. } => {
                if suffixes.is_empty() || suffixes.iter().any(|s| s.trim_start_matches('.').is_empty()) {
                    return Err(AuthzError::Configuration(
                        "auxiliary reader needs non-empty suffixes".to_string(),
                    ));
                }
                reader.validate()
            }
            ReaderConfig::ParentContainer { reader } => reader.validate(),
            ReaderConfig::WebAcl | ReaderConfig::Acp | ReaderConfig::Static { .. } => Ok(()),
        }
    }

    pub fn build(
        &self,
        identifiers: &IdentifierStrategy,
        collaborators: &Collaborators,
    ) -> Result<Arc<dyn PermissionReader>> {
        let reader: Arc<dyn PermissionReader> = match self {
            ReaderConfig::Union { readers } => Arc::new(UnionReader::new(
                readers
                    .iter()
                    .map(|reader| reader.build(identifiers, collaborators))
                    .collect::<Result<Vec<_>>>()?,
            )),
            ReaderConfig::PathBased { routes } => {
                let mut compiled = Vec::with_capacity(routes.len());
                for route in routes {
                    let pattern = Regex::new(&route.pattern).map_err(|e| {
                        AuthzError::Configuration(format!("invalid pattern {}: {}", route.pattern, e))
                    })?;
                    compiled.push((pattern, route.reader.build(identifiers, collaborators)?));
                }
                Arc::new(PathBasedReader::new(identifiers.clone(), compiled))
            }
            ReaderConfig::Auxiliary {
                suffixes,
                naming,
                reader,
            } => Arc::new(AuxiliaryReader::new(
                reader.build(identifiers, collaborators)?,
                suffixes
                    .iter()
                    .map(|suffix| AuxiliaryStrategy::with_naming(suffix, *naming))
                    .collect(),
            )),
            ReaderConfig::ParentContainer { reader } => Arc::new(ParentContainerReader::new(
                reader.build(identifiers, collaborators)?,
                identifiers.clone(),
            )),
            ReaderConfig::WebAcl => Arc::new(WebAclReader::new(
                collaborators.fetcher.clone(),
                identifiers.clone(),
                collaborators.groups.clone(),
            )),
            ReaderConfig::Acp => Arc::new(AcpReader::new(
                collaborators.fetcher.clone(),
                identifiers.clone(),
                collaborators.groups.clone(),
            )),
            ReaderConfig::Static { grant: StaticGrant::All } => Arc::new(StaticReader::allow_all()),
            ReaderConfig::Static { grant: StaticGrant::None } => Arc::new(StaticReader::undefined()),
        };
        Ok(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryPodRegistry;
    use crate::modes::{Method, Operation};
    use crate::sources::NoGroups;
    use crate::types::Credentials;
    use std::io::Write;

    const FULL: &str = r#"
base_url: https://pod.example/
deadline_ms: 2000
reader:
  type: union
  readers:
    - type: path_based
      routes:
        - pattern: '^/\.well-known/'
          reader: { type: static, grant: all }
        - pattern: '.*'
          reader:
            type: parent_container
            reader:
              type: auxiliary
              suffixes: ['.meta']
              reader: { type: web_acl }
    - type: acp
"#;

    fn collaborators(store: InMemoryStore) -> Collaborators {
        Collaborators::in_memory(store, Arc::new(NoGroups), Arc::new(InMemoryPodRegistry::default()))
    }

    #[test]
    fn test_auxiliary_naming_option() {
        let config = AuthorizationConfig::from_yaml(
            "base_url: https://pod.example/\nreader: { type: auxiliary, suffixes: [meta], naming: hidden, reader: { type: acp } }\n",
        )
        .unwrap();
        let ReaderConfig::Auxiliary { naming, .. } = &config.reader else {
            panic!("expected auxiliary, got {:?}", config.reader);
        };
        assert_eq!(*naming, AuxiliaryNaming::Hidden);

        let ReaderConfig::Union { readers } = AuthorizationConfig::from_yaml(FULL).unwrap().reader else {
            panic!("expected union");
        };
        let ReaderConfig::PathBased { routes } = &readers[0] else {
            panic!("expected path_based");
        };
        let ReaderConfig::ParentContainer { reader } = &routes[1].reader else {
            panic!("expected parent_container");
        };
        assert!(matches!(
            reader.as_ref(),
            ReaderConfig::Auxiliary { naming: AuxiliaryNaming::Appended, .. }
        ));
    }

    #[test]
    fn test_parse_full_composition() {
        let config = AuthorizationConfig::from_yaml(FULL).unwrap();
        assert!(config.owner_override);
        assert_eq!(config.deadline(), Some(Duration::from_secs(2)));
        let ReaderConfig::Union { readers } = &config.reader else {
            panic!("expected union, got {:?}", config.reader);
        };
        assert_eq!(readers.len(), 2);
        assert_eq!(readers[1], ReaderConfig::Acp);
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults() {
        let config = AuthorizationConfig::from_yaml("base_url: https://pod.example/\n").unwrap();
        assert_eq!(config.reader, ReaderConfig::WebAcl);
        assert!(config.owner_override);
        assert_eq!(config.deadline(), None);
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            "base_url: https://pod.example\n",
            "base_url: ftp://pod.example/\n",
            "base_url: https://pod.example/\nreader: { type: union, readers: [] }\n",
            "base_url: https://pod.example/\nreader: { type: path_based, routes: [{pattern: '(', reader: {type: acp}}] }\n",
            "base_url: https://pod.example/\nreader: { type: auxiliary, suffixes: [], reader: {type: acp} }\n",
        ];
        for yaml in cases {
            let config = AuthorizationConfig::from_yaml(yaml).unwrap();
            assert!(
                matches!(config.validate(), Err(AuthzError::Configuration(_))),
                "expected rejection of {yaml}"
            );
        }
    }

    #[test]
    fn test_unknown_reader_type_fails_to_parse() {
        let result = AuthorizationConfig::from_yaml("base_url: https://pod.example/\nreader: { type: magic }\n");
        assert!(matches!(result, Err(AuthzError::Configuration(_))));
    }

    #[test]
    fn test_from_file_and_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();
        let config = AuthorizationConfig::from_file(file.path()).unwrap();
        let reparsed = AuthorizationConfig::from_yaml(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(config, reparsed);
    }

    #[tokio::test]
    async fn test_built_authorizer_routes_well_known() {
        let config = AuthorizationConfig::from_yaml(FULL).unwrap();
        let authorizer = config.build(&collaborators(InMemoryStore::new())).unwrap();

        let open = authorizer
            .authorize(
                &Operation::new(Method::Get, "https://pod.example/.well-known/solid"),
                &Credentials::anonymous(),
            )
            .await
            .unwrap();
        assert!(open.is_allowed());

        let closed = authorizer
            .authorize(
                &Operation::new(Method::Get, "https://pod.example/private"),
                &Credentials::anonymous(),
            )
            .await
            .unwrap();
        assert!(!closed.is_allowed());
    }
}
