//! The authorization decision: required modes against granted permissions.

use crate::error::{AuthzError, Result};
use crate::identifier::ResourceIdentifier;
use crate::modes::{ModesExtractor, Operation};
use crate::readers::{OwnerReader, PermissionReader};
use crate::types::{AccessMap, AccessMode, Credentials, Grant, PermissionMap};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, warn};

/// Outcome of an authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    /// Denied and no WebID was presented; authenticating may help.
    Unauthenticated,
    /// Denied for an authenticated agent.
    Forbidden,
}

/// A required mode that was not granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub resource: ResourceIdentifier,
    pub mode: AccessMode,
    pub grant: Grant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Authorization {
    pub decision: Decision,
    pub violations: Vec<Violation>,
    pub required: AccessMap,
    pub granted: PermissionMap,
}

impl Authorization {
    pub fn is_allowed(&self) -> bool {
        self.decision == Decision::Allow
    }
}

/// Decides whether an operation may proceed.
///
/// # Example
///
/// ```rust,no_run
/// # async fn demo(authorizer: authz::Authorizer) -> authz::Result<()> {
/// use authz::{Credentials, Method, Operation};
///
/// let operation = Operation::new(Method::Get, "https://pod.example/notes/today");
/// let authorization = authorizer
///     .authorize(&operation, &Credentials::agent("https://alice.example/profile#me"))
///     .await?;
/// if !authorization.is_allowed() {
///     println!("denied: {:?}", authorization.violations);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Authorizer {
    extractor: ModesExtractor,
    reader: Arc<dyn PermissionReader>,
    owner: Option<OwnerReader>,
}

impl Authorizer {
    pub fn new(extractor: ModesExtractor, reader: Arc<dyn PermissionReader>) -> Self {
        Self {
            extractor,
            reader,
            owner: None,
        }
    }

    /// Lets pod owners override whatever `reader` decides about the
    /// authorization documents of their pod.
    pub fn with_owner_override(mut self, owner: OwnerReader) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn reader(&self) -> &Arc<dyn PermissionReader> {
        &self.reader
    }

    /// The permissions the composed readers grant, with the owner override
    /// applied. Reader failures produce an empty answer.
    pub async fn permissions(&self, credentials: &Credentials, requested: &AccessMap) -> PermissionMap {
        let mut granted = match self.reader.read(credentials, requested).await {
            Ok(map) => map,
            Err(e) => {
                error!("Permission reader {} failed: {}", self.reader.name(), e);
                PermissionMap::new()
            }
        };

        if let Some(owner) = &self.owner {
            match owner.read(credentials, requested).await {
                Ok(overrides) => granted.override_grants(&overrides),
                Err(e) => warn!("Owner lookup failed, no override applied: {}", e),
            }
        }
        granted
    }

    pub async fn authorize(&self, operation: &Operation, credentials: &Credentials) -> Result<Authorization> {
        let required = self.extractor.extract(operation).await.map_err(|e| {
            error!("Could not determine required modes for {}: {}", operation.target, e);
            e
        })?;
        let granted = self.permissions(credentials, &required).await;

        let mut violations = Vec::new();
        for (resource, modes) in required.iter() {
            let set = granted.get(resource);
            for mode in modes {
                let grant = set.get(*mode);
                if !grant.is_granted() {
                    violations.push(Violation {
                        resource: resource.clone(),
                        mode: *mode,
                        grant,
                    });
                }
            }
        }

        let decision = if violations.is_empty() {
            Decision::Allow
        } else if credentials.is_authenticated() {
            Decision::Forbidden
        } else {
            Decision::Unauthenticated
        };

        match decision {
            Decision::Allow => info!(
                "Allowed {} {} for {}",
                operation.method,
                operation.target,
                agent_label(credentials)
            ),
            _ => warn!(
                "Denied {} {} for {}: {}",
                operation.method,
                operation.target,
                agent_label(credentials),
                describe(&violations)
            ),
        }

        Ok(Authorization {
            decision,
            violations,
            required,
            granted,
        })
    }

    /// Like [`authorize`](Self::authorize) but gives up at `deadline`.
    pub async fn authorize_until(
        &self,
        operation: &Operation,
        credentials: &Credentials,
        deadline: Instant,
    ) -> Result<Authorization> {
        match timeout_at(deadline, self.authorize(operation, credentials)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Authorization of {} {} timed out", operation.method, operation.target);
                Err(AuthzError::DeadlineExceeded)
            }
        }
    }
}

fn agent_label(credentials: &Credentials) -> &str {
    credentials.web_id.as_deref().unwrap_or("anonymous")
}

fn describe(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}:{}", v.resource, v.mode))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::{authorization_auxiliaries, IdentifierStrategy};
    use crate::memory::{InMemoryPodRegistry, InMemoryStore};
    use crate::modes::Method;
    use crate::pods::Pod;
    use crate::readers::testing::ScriptedReader;
    use crate::readers::StaticReader;
    use crate::types::PermissionSet;
    use async_trait::async_trait;
    use std::time::Duration;

    const BASE: &str = "https://ex/";
    const ALICE: &str = "https://ex/alice/profile#me";

    fn authorizer(store: InMemoryStore, reader: Arc<dyn PermissionReader>) -> Authorizer {
        let extractor = ModesExtractor::new(
            IdentifierStrategy::new(BASE).unwrap(),
            Arc::new(store),
            authorization_auxiliaries(),
        );
        Authorizer::new(extractor, reader)
    }

    #[tokio::test]
    async fn test_allow_when_everything_granted() {
        let store = InMemoryStore::new().with_resource("https://ex/doc");
        let authorization = authorizer(store, Arc::new(StaticReader::allow_all()))
            .authorize(&Operation::new(Method::Get, "https://ex/doc"), &Credentials::anonymous())
            .await
            .unwrap();
        assert_eq!(authorization.decision, Decision::Allow);
        assert!(authorization.violations.is_empty());
    }

    #[tokio::test]
    async fn test_unauthenticated_vs_forbidden() {
        let store = InMemoryStore::new().with_resource("https://ex/doc");
        let authorizer = authorizer(store, Arc::new(StaticReader::undefined()));
        let operation = Operation::new(Method::Get, "https://ex/doc");

        let anonymous = authorizer
            .authorize(&operation, &Credentials::anonymous())
            .await
            .unwrap();
        assert_eq!(anonymous.decision, Decision::Unauthenticated);

        let alice = authorizer
            .authorize(&operation, &Credentials::agent(ALICE))
            .await
            .unwrap();
        assert_eq!(alice.decision, Decision::Forbidden);
        assert_eq!(
            alice.violations,
            vec![Violation {
                resource: "https://ex/doc".into(),
                mode: AccessMode::Read,
                grant: Grant::Undefined,
            }]
        );
    }

    #[tokio::test]
    async fn test_reader_failure_is_a_denial() {
        let store = InMemoryStore::new().with_resource("https://ex/doc");
        let reader = Arc::new(ScriptedReader::new().failing_on("https://ex/doc"));
        let authorization = authorizer(store, reader)
            .authorize(&Operation::new(Method::Get, "https://ex/doc"), &Credentials::agent(ALICE))
            .await
            .unwrap();
        assert_eq!(authorization.decision, Decision::Forbidden);
        assert!(authorization.granted.is_empty());
    }

    #[tokio::test]
    async fn test_oracle_failure_is_an_error() {
        let store = InMemoryStore::new().with_failure("https://ex/doc");
        let result = authorizer(store, Arc::new(StaticReader::allow_all()))
            .authorize(&Operation::new(Method::Put, "https://ex/doc"), &Credentials::anonymous())
            .await;
        assert!(matches!(result, Err(AuthzError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_owner_override_beats_deny() {
        let store = InMemoryStore::new().with_resource("https://ex/alice/.acl");
        let reader = Arc::new(
            ScriptedReader::new().with("https://ex/alice/.acl", PermissionSet::all(Grant::Deny)),
        );
        let owner = OwnerReader::new(
            Arc::new(InMemoryPodRegistry::new([
                Pod::new("alice", "https://ex/alice/").with_owner(ALICE)
            ])),
            authorization_auxiliaries(),
        );
        let authorizer = authorizer(store, reader).with_owner_override(owner);

        let authorization = authorizer
            .authorize(
                &Operation::new(Method::Get, "https://ex/alice/.acl"),
                &Credentials::agent(ALICE),
            )
            .await
            .unwrap();
        assert_eq!(authorization.decision, Decision::Allow);

        let authorization = authorizer
            .authorize(
                &Operation::new(Method::Get, "https://ex/alice/.acl"),
                &Credentials::agent("https://eve/#me"),
            )
            .await
            .unwrap();
        assert_eq!(authorization.decision, Decision::Forbidden);
    }

    struct SlowReader;

    #[async_trait]
    impl PermissionReader for SlowReader {
        async fn read(&self, _credentials: &Credentials, _requested: &AccessMap) -> Result<PermissionMap> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(PermissionMap::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_aborts() {
        let store = InMemoryStore::new().with_resource("https://ex/doc");
        let result = authorizer(store, Arc::new(SlowReader))
            .authorize_until(
                &Operation::new(Method::Get, "https://ex/doc"),
                &Credentials::anonymous(),
                Instant::now() + Duration::from_millis(50),
            )
            .await;
        assert!(matches!(result, Err(AuthzError::DeadlineExceeded)));
    }
}
