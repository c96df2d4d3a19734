use authz::{Credentials, Decision, Method, Operation, PatchBody};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use std::str::FromStr;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::{wac_allow, AppState};

/// Patch dialects the server understands.
const PATCH_CONTENT_TYPES: [&str; 2] = ["text/n3", "application/sparql-update"];

/// Authorization middleware
///
/// # Authorization Flow
///
/// 1. Build the [`Operation`] from method, path, `Content-Type` and the
///    [`PatchBody`] extension installed by the body parser
/// 2. Take [`Credentials`] from the request extensions (anonymous if absent)
/// 3. Run the authorizer, bounded by the configured deadline
/// 4. Allow: forward and add `WAC-Allow` (omitted if the deadline passes
///    while computing it); otherwise 401 or 403
///
/// # Security Notes
///
/// - Credentials must be installed by an authentication layer that ran
///   before this one; this layer never inspects tokens itself
/// - 401 carries a `WWW-Authenticate` challenge, 403 does not
/// - Any failure computing the decision fails closed with an opaque 5xx
pub async fn authorization_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> ApiResult<Response> {
    let operation = extract_operation(&state, &request)?;
    let credentials = request
        .extensions()
        .get::<Credentials>()
        .cloned()
        .unwrap_or_default();

    debug!(
        "AUTHZ MIDDLEWARE: Checking {} {} for {:?}",
        operation.method, operation.target, credentials.web_id
    );

    let deadline = state.deadline.map(|deadline| Instant::now() + deadline);
    let authorization = match deadline {
        Some(deadline) => {
            state
                .authorizer
                .authorize_until(&operation, &credentials, deadline)
                .await?
        }
        None => state.authorizer.authorize(&operation, &credentials).await?,
    };

    match authorization.decision {
        Decision::Allow => {
            let header = wac_allow::header_value(&state.authorizer, &operation.target, &credentials);
            let wac_allow = match deadline {
                Some(deadline) => timeout_at(deadline, header).await.ok(),
                None => Some(header.await),
            };
            if wac_allow.is_none() {
                warn!("AUTHZ MIDDLEWARE: Deadline passed computing WAC-Allow for {}", operation.target);
            }

            let mut response = next.run(request).await;
            if let Some(value) = wac_allow.and_then(|value| HeaderValue::from_str(&value).ok()) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static(wac_allow::WAC_ALLOW), value);
            }
            info!("AUTHZ MIDDLEWARE: Access ALLOWED for {} {}", operation.method, operation.target);
            Ok(response)
        }
        Decision::Unauthenticated => {
            warn!("AUTHZ MIDDLEWARE: Authentication required for {}", operation.target);
            Err(ApiError::Unauthorized {
                realm: state.identifiers.base_url().to_string(),
            })
        }
        Decision::Forbidden => {
            warn!(
                "AUTHZ MIDDLEWARE: Access DENIED for {:?} on {}",
                credentials.web_id, operation.target
            );
            Err(ApiError::Forbidden)
        }
    }
}

/// Extract the operation from the request
///
/// The request path is the full path on the server's origin; the router is
/// not expected to be nested under the base path. Paths outside the base
/// path are rejected with 400. PATCH requests must use one of the supported
/// patch dialects.
pub fn extract_operation(state: &AppState, request: &Request<Body>) -> ApiResult<Operation> {
    let method = Method::from_str(request.method().as_str())?;
    let target = state.identifiers.resolve_path(request.uri().path())?;
    let mut operation = Operation::new(method, target);

    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    if method == Method::Patch {
        let essence = content_type
            .as_deref()
            .map(media_type_essence)
            .unwrap_or_default();
        if !PATCH_CONTENT_TYPES.contains(&essence.as_str()) {
            return Err(ApiError::UnsupportedMediaType(
                content_type.unwrap_or_else(|| "<none>".to_string()),
            ));
        }
    }

    if let Some(content_type) = content_type {
        operation = operation.with_content_type(content_type);
    }
    if let Some(patch) = request.extensions().get::<PatchBody>() {
        operation = operation.with_patch(patch.clone());
    }
    Ok(operation)
}

/// `text/n3; charset=utf-8` -> `text/n3`
fn media_type_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
