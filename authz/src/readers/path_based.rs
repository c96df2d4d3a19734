use super::PermissionReader;
use crate::error::Result;
use crate::identifier::IdentifierStrategy;
use crate::types::{AccessMap, Credentials, PermissionMap};
use async_trait::async_trait;
use futures::future::try_join_all;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

/// Routes each resource to the first reader whose pattern matches its path
/// relative to the base URL (always starting with `/`).
///
/// Resources that match no pattern, or lie outside the base URL, get no
/// entry. Any routed reader failing fails the whole read.
pub struct PathBasedReader {
    identifiers: IdentifierStrategy,
    routes: Vec<(Regex, Arc<dyn PermissionReader>)>,
}

impl PathBasedReader {
    pub fn new(identifiers: IdentifierStrategy, routes: Vec<(Regex, Arc<dyn PermissionReader>)>) -> Self {
        Self { identifiers, routes }
    }

    fn route(&self, path: &str) -> Option<usize> {
        self.routes.iter().position(|(pattern, _)| pattern.is_match(path))
    }
}

#[async_trait]
impl PermissionReader for PathBasedReader {
    async fn read(&self, credentials: &Credentials, requested: &AccessMap) -> Result<PermissionMap> {
        let mut partitions: Vec<AccessMap> = vec![AccessMap::new(); self.routes.len()];
        for (id, modes) in requested.iter() {
            let Some(path) = self.identifiers.relative_path(id) else {
                debug!("{} is outside {}, not routed", id, self.identifiers.base_url());
                continue;
            };
            match self.route(&path) {
                Some(index) => partitions[index].set(id, modes.clone()),
                None => debug!("No route for {}", path),
            }
        }

        let reads = self
            .routes
            .iter()
            .zip(&partitions)
            .filter(|(_, partition)| !partition.is_empty())
            .map(|((_, reader), partition)| reader.read(credentials, partition));
        let results = try_join_all(reads).await?;

        let mut merged = PermissionMap::new();
        for map in &results {
            merged.merge(map);
        }
        merged.retain_requested(requested);
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::testing::ScriptedReader;
    use crate::readers::StaticReader;
    use crate::types::{AccessMode, Grant, ModeSet, PermissionSet};

    fn reader(routes: Vec<(&str, Arc<dyn PermissionReader>)>) -> PathBasedReader {
        PathBasedReader::new(
            IdentifierStrategy::new("https://ex/").unwrap(),
            routes
                .into_iter()
                .map(|(pattern, reader)| (Regex::new(pattern).unwrap(), reader))
                .collect(),
        )
    }

    fn request(ids: &[&str]) -> AccessMap {
        ids.iter()
            .map(|id| ((*id).into(), ModeSet::from([AccessMode::Read])))
            .collect()
    }

    #[tokio::test]
    async fn test_first_matching_route_wins() {
        let public: Arc<dyn PermissionReader> = Arc::new(StaticReader::allow_all());
        let private: Arc<dyn PermissionReader> =
            Arc::new(StaticReader::new(PermissionSet::denying([AccessMode::Read])));
        let path_based = reader(vec![("^/public/", public), ("^/", private)]);

        let map = path_based
            .read(
                &Credentials::anonymous(),
                &request(&["https://ex/public/a", "https://ex/private/b"]),
            )
            .await
            .unwrap();
        assert_eq!(map.get(&"https://ex/public/a".into()).get(AccessMode::Read), Grant::Grant);
        assert_eq!(map.get(&"https://ex/private/b".into()).get(AccessMode::Read), Grant::Deny);
    }

    #[tokio::test]
    async fn test_unrouted_and_foreign_resources_get_no_entry() {
        let allow: Arc<dyn PermissionReader> = Arc::new(StaticReader::allow_all());
        let path_based = reader(vec![("^/only/", allow)]);
        let map = path_based
            .read(
                &Credentials::anonymous(),
                &request(&["https://ex/other", "https://elsewhere/only/x"]),
            )
            .await
            .unwrap();
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn test_routed_reader_only_sees_its_resources() {
        let scripted = Arc::new(ScriptedReader::new());
        let fallback: Arc<dyn PermissionReader> = Arc::new(StaticReader::undefined());
        let path_based = reader(vec![
            ("^/a/", scripted.clone() as Arc<dyn PermissionReader>),
            ("^/", fallback),
        ]);
        path_based
            .read(&Credentials::anonymous(), &request(&["https://ex/a/1", "https://ex/b/2"]))
            .await
            .unwrap();

        let seen = scripted.requests();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains(&"https://ex/a/1".into()));
        assert!(!seen[0].contains(&"https://ex/b/2".into()));
    }

    #[tokio::test]
    async fn test_routed_failure_propagates() {
        let failing: Arc<dyn PermissionReader> =
            Arc::new(ScriptedReader::new().failing_on("https://ex/x"));
        let path_based = reader(vec![("^/", failing)]);
        assert!(path_based
            .read(&Credentials::anonymous(), &request(&["https://ex/x"]))
            .await
            .is_err());
    }
}
