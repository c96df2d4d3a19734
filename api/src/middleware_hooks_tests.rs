//! Integration tests for authorization middleware
//!
//! These tests drive the full router with `tower::ServiceExt::oneshot`
//! against an in-memory pod.

#[cfg(test)]
mod tests {
    use crate::{create_router, wac_allow::WAC_ALLOW, AppState};
    use async_trait::async_trait;
    use authz::memory::{InMemoryPodRegistry, InMemoryStore};
    use authz::sources::NoGroups;
    use authz::{
        AccessMap, AuthorizationConfig, Authorizer, Collaborators, Credentials, IdentifierStrategy,
        ModesExtractor, PatchBody, PermissionMap, PermissionReader,
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
        Router,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    const ALICE: &str = "https://alice.example/profile#me";

    const CONFIG: &str = r#"
base_url: https://pod.example/
reader:
  type: parent_container
  reader: { type: web_acl }
"#;

    fn store() -> InMemoryStore {
        let acl = serde_json::json!({"authorizations": [
            {"agentClass": "foaf:Agent", "accessTo": "./public", "mode": "acl:Read"},
            {"agent": ALICE, "accessTo": "./", "default": "./",
             "mode": ["acl:Read", "acl:Write", "acl:Control"]}
        ]});
        InMemoryStore::new()
            .with_resource("https://pod.example/")
            .with_resource("https://pod.example/public")
            .with_resource("https://pod.example/private")
            .with_document("https://pod.example/.acl", acl.to_string())
            .with_failure("https://pod.example/broken")
    }

    fn app() -> Router {
        let config = AuthorizationConfig::from_yaml(CONFIG).unwrap();
        let collaborators = Collaborators::in_memory(
            store(),
            Arc::new(NoGroups),
            Arc::new(InMemoryPodRegistry::default()),
        );
        let state = AppState::from_config(&config, &collaborators).unwrap();
        create_router(state, Router::new().fallback(|| async { "resource" }))
    }

    async fn send(request: Request<Body>) -> Response {
        app().oneshot(request).await.unwrap()
    }

    fn get(path: &str) -> axum::http::request::Builder {
        Request::builder().method("GET").uri(path)
    }

    #[tokio::test]
    async fn test_public_read_is_allowed() {
        let response = send(get("/public").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[WAC_ALLOW], "user=\"read\",public=\"read\"");
    }

    #[tokio::test]
    async fn test_anonymous_private_read_is_challenged() {
        let response = send(get("/private").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "DPoP realm=\"https://pod.example/\", Bearer realm=\"https://pod.example/\""
        );
    }

    #[tokio::test]
    async fn test_authenticated_stranger_is_forbidden() {
        let request = get("/private")
            .extension(Credentials::agent("https://eve.example/profile#me"))
            .body(Body::empty())
            .unwrap();
        let response = send(request).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[tokio::test]
    async fn test_acl_agent_gets_full_wac_allow() {
        let request = get("/private")
            .extension(Credentials::agent(ALICE))
            .body(Body::empty())
            .unwrap();
        let response = send(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[WAC_ALLOW],
            "user=\"read write append control\",public=\"\""
        );
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let request = Request::builder()
            .method("TRACE")
            .uri("/public")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(request).await.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_patch_content_types() {
        let request = Request::builder()
            .method("PATCH")
            .uri("/private")
            .header(header::CONTENT_TYPE, "application/json")
            .extension(Credentials::agent(ALICE))
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(request).await.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let request = Request::builder()
            .method("PATCH")
            .uri("/private")
            .header(header::CONTENT_TYPE, "text/n3; charset=utf-8")
            .extension(Credentials::agent(ALICE))
            .extension(PatchBody::default())
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(request).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_oracle_failure_is_opaque_500() {
        let request = Request::builder()
            .method("PUT")
            .uri("/broken")
            .extension(Credentials::agent(ALICE))
            .body(Body::empty())
            .unwrap();
        let response = send(request).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({"error": {"code": "INTERNAL_ERROR"}}));
    }

    #[test]
    fn test_extract_operation_resolves_target() {
        let identifiers = IdentifierStrategy::new("https://pod.example/").unwrap();
        let extractor = ModesExtractor::new(identifiers.clone(), Arc::new(store()), vec![]);
        let state = AppState::new(Arc::new(Authorizer::new(extractor, Arc::new(SlowReader))), identifiers);

        let request = Request::builder()
            .method("POST")
            .uri("/notes/?unused=1")
            .header(header::CONTENT_TYPE, "text/turtle")
            .body(Body::empty())
            .unwrap();
        let operation = crate::middleware_hooks::extract_operation(&state, &request).unwrap();
        assert_eq!(operation.method, authz::Method::Post);
        assert_eq!(operation.target.as_str(), "https://pod.example/notes/");
        assert_eq!(operation.content_type.as_deref(), Some("text/turtle"));
        assert!(operation.patch.is_none());
    }

    #[tokio::test]
    async fn test_base_path_is_stripped_from_request_paths() {
        let config = AuthorizationConfig::from_yaml(
            "base_url: https://pod.example/pod/\nreader: { type: web_acl }\n",
        )
        .unwrap();
        let acl = serde_json::json!({"authorizations": [
            {"agentClass": "foaf:Agent", "accessTo": "./public", "mode": "acl:Read"}
        ]});
        let store = InMemoryStore::new()
            .with_resource("https://pod.example/pod/public")
            .with_document("https://pod.example/pod/.acl", acl.to_string());
        let collaborators = Collaborators::in_memory(
            store,
            Arc::new(NoGroups),
            Arc::new(InMemoryPodRegistry::default()),
        );
        let state = AppState::from_config(&config, &collaborators).unwrap();
        let app = create_router(state, Router::new().fallback(|| async { "resource" }));

        let response = app
            .clone()
            .oneshot(get("/pod/public").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(get("/elsewhere/public").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    /// Grants everything on the first read and stalls on every later one.
    #[derive(Default)]
    struct FastThenSlowReader {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PermissionReader for FastThenSlowReader {
        async fn read(&self, _credentials: &Credentials, requested: &AccessMap) -> authz::Result<PermissionMap> {
            if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(requested
                .iter()
                .map(|(id, modes)| (id.clone(), authz::PermissionSet::granting(modes.iter().copied())))
                .collect())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wac_allow_is_dropped_when_deadline_passes() {
        let identifiers = IdentifierStrategy::new("https://pod.example/").unwrap();
        let extractor = ModesExtractor::new(
            identifiers.clone(),
            Arc::new(store()),
            authz::identifier::authorization_auxiliaries(),
        );
        let authorizer = Authorizer::new(extractor, Arc::new(FastThenSlowReader::default()));
        let state = AppState::new(Arc::new(authorizer), identifiers).with_deadline(Duration::from_millis(100));
        let app = create_router(state, Router::new().fallback(|| async { "resource" }));

        let response = app
            .oneshot(get("/public").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(WAC_ALLOW).is_none());
    }

    struct SlowReader;

    #[async_trait]
    impl PermissionReader for SlowReader {
        async fn read(&self, _credentials: &Credentials, _requested: &AccessMap) -> authz::Result<PermissionMap> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(PermissionMap::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_is_503() {
        let identifiers = IdentifierStrategy::new("https://pod.example/").unwrap();
        let extractor = ModesExtractor::new(
            identifiers.clone(),
            Arc::new(store()),
            authz::identifier::authorization_auxiliaries(),
        );
        let authorizer = Authorizer::new(extractor, Arc::new(SlowReader));
        let state = AppState::new(Arc::new(authorizer), identifiers).with_deadline(Duration::from_millis(100));
        let app = create_router(state, Router::new().fallback(|| async { "resource" }));

        let response = app
            .oneshot(get("/public").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
