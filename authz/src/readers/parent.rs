use super::PermissionReader;
use crate::error::Result;
use crate::identifier::{IdentifierStrategy, ResourceIdentifier};
use crate::types::{AccessMap, AccessMode, Credentials, Grant, PermissionMap};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Derives `Create` and `Delete` on a resource from its parent container.
///
/// A resource that needs `Create` also asks for `Append` on its parent; one
/// that needs `Delete` asks for `Write` on its parent. Nothing else is asked
/// of the parent. Afterwards:
///
/// - a denied `Append` on the parent denies `Create`, a granted one grants
///   `Create` unless it was already decided;
/// - a denied `Write` on the parent denies `Delete`, a granted one grants
///   `Delete` if `Write` on the resource is granted too and `Delete` was not
///   already decided.
pub struct ParentContainerReader {
    reader: Arc<dyn PermissionReader>,
    identifiers: IdentifierStrategy,
}

struct ParentLink {
    child: ResourceIdentifier,
    parent: ResourceIdentifier,
    create: bool,
    delete: bool,
}

impl ParentContainerReader {
    pub fn new(reader: Arc<dyn PermissionReader>, identifiers: IdentifierStrategy) -> Self {
        Self { reader, identifiers }
    }
}

#[async_trait]
impl PermissionReader for ParentContainerReader {
    async fn read(&self, credentials: &Credentials, requested: &AccessMap) -> Result<PermissionMap> {
        let mut augmented = requested.clone();
        let mut links = Vec::new();
        for (id, modes) in requested.iter() {
            let create = modes.contains(&AccessMode::Create);
            let delete = modes.contains(&AccessMode::Delete);
            if !create && !delete {
                continue;
            }
            let Some(parent) = self.identifiers.parent(id) else {
                debug!("{} has no parent container", id);
                continue;
            };
            if create {
                augmented.add(&parent, [AccessMode::Append]);
            }
            if delete {
                augmented.add(&parent, [AccessMode::Write]);
            }
            links.push(ParentLink {
                child: id.clone(),
                parent,
                create,
                delete,
            });
        }

        let mut result = self.reader.read(credentials, &augmented).await?;

        for link in &links {
            let parent = result.get(&link.parent);
            let child = result.entry_mut(&link.child);
            if link.create {
                match parent.get(AccessMode::Append) {
                    Grant::Deny => child.set(AccessMode::Create, Grant::Deny),
                    Grant::Grant if !child.get(AccessMode::Create).is_defined() => {
                        child.set(AccessMode::Create, Grant::Grant)
                    }
                    _ => {}
                }
            }
            if link.delete {
                match parent.get(AccessMode::Write) {
                    Grant::Deny => child.set(AccessMode::Delete, Grant::Deny),
                    Grant::Grant
                        if child.get(AccessMode::Write).is_granted()
                            && !child.get(AccessMode::Delete).is_defined() =>
                    {
                        child.set(AccessMode::Delete, Grant::Grant)
                    }
                    _ => {}
                }
            }
        }

        result.retain_requested(requested);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::testing::ScriptedReader;
    use crate::types::{ModeSet, PermissionSet};

    const PARENT: &str = "https://ex/c/";
    const CHILD: &str = "https://ex/c/doc";

    fn reader(inner: Arc<ScriptedReader>) -> ParentContainerReader {
        ParentContainerReader::new(inner, IdentifierStrategy::new("https://ex/").unwrap())
    }

    fn request(id: &str, modes: &[AccessMode]) -> AccessMap {
        [(id.into(), modes.iter().copied().collect::<ModeSet>())]
            .into_iter()
            .collect()
    }

    #[tokio::test]
    async fn test_create_follows_parent_append() {
        let inner = Arc::new(
            ScriptedReader::new().with(PARENT, PermissionSet::granting([AccessMode::Append])),
        );
        let map = reader(inner.clone())
            .read(&Credentials::anonymous(), &request(CHILD, &[AccessMode::Create]))
            .await
            .unwrap();
        assert_eq!(map.get(&CHILD.into()).get(AccessMode::Create), Grant::Grant);
        assert!(!map.contains(&PARENT.into()));

        let seen = inner.requests();
        assert_eq!(seen[0].get(&PARENT.into()), Some(&ModeSet::from([AccessMode::Append])));
    }

    #[tokio::test]
    async fn test_parent_deny_wins_over_child_grant() {
        let inner = Arc::new(
            ScriptedReader::new()
                .with(PARENT, PermissionSet::denying([AccessMode::Append, AccessMode::Write]))
                .with(CHILD, PermissionSet::all(Grant::Grant)),
        );
        let map = reader(inner)
            .read(
                &Credentials::anonymous(),
                &request(CHILD, &[AccessMode::Create, AccessMode::Delete]),
            )
            .await
            .unwrap();
        let set = map.get(&CHILD.into());
        assert_eq!(set.get(AccessMode::Create), Grant::Deny);
        assert_eq!(set.get(AccessMode::Delete), Grant::Deny);
    }

    #[tokio::test]
    async fn test_delete_needs_write_on_both() {
        let inner = Arc::new(
            ScriptedReader::new().with(PARENT, PermissionSet::granting([AccessMode::Write])),
        );
        let map = reader(inner)
            .read(&Credentials::anonymous(), &request(CHILD, &[AccessMode::Delete]))
            .await
            .unwrap();
        assert_eq!(map.get(&CHILD.into()).get(AccessMode::Delete), Grant::Undefined);

        let inner = Arc::new(
            ScriptedReader::new()
                .with(PARENT, PermissionSet::granting([AccessMode::Write]))
                .with(CHILD, PermissionSet::granting([AccessMode::Write])),
        );
        let map = reader(inner)
            .read(&Credentials::anonymous(), &request(CHILD, &[AccessMode::Delete]))
            .await
            .unwrap();
        assert_eq!(map.get(&CHILD.into()).get(AccessMode::Delete), Grant::Grant);
    }

    #[tokio::test]
    async fn test_only_append_and_write_are_asked_of_parent() {
        let inner = Arc::new(ScriptedReader::new());
        reader(inner.clone())
            .read(
                &Credentials::anonymous(),
                &request(CHILD, &[AccessMode::Read, AccessMode::Create, AccessMode::Delete]),
            )
            .await
            .unwrap();
        let seen = inner.requests();
        assert_eq!(
            seen[0].get(&PARENT.into()),
            Some(&ModeSet::from([AccessMode::Append, AccessMode::Write]))
        );
    }

    #[tokio::test]
    async fn test_no_parent_lookup_without_create_or_delete() {
        let inner = Arc::new(ScriptedReader::new());
        reader(inner.clone())
            .read(&Credentials::anonymous(), &request(CHILD, &[AccessMode::Read, AccessMode::Write]))
            .await
            .unwrap();
        assert!(!inner.requests()[0].contains(&PARENT.into()));
    }

    #[tokio::test]
    async fn test_root_has_no_parent() {
        let inner = Arc::new(ScriptedReader::new());
        let map = reader(inner.clone())
            .read(&Credentials::anonymous(), &request("https://ex/", &[AccessMode::Delete]))
            .await
            .unwrap();
        assert_eq!(inner.requests()[0].len(), 1);
        assert_eq!(map.get(&"https://ex/".into()).get(AccessMode::Delete), Grant::Undefined);
    }
}
