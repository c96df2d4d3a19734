use authz::{AuthorizationConfig, Authorizer, Collaborators, IdentifierStrategy};
use axum::{http::HeaderName, middleware, Router};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod error;
pub mod middleware_hooks;
pub mod wac_allow;

#[cfg(test)]
mod middleware_hooks_tests;

/// Application state shared across middleware
#[derive(Clone)]
pub struct AppState {
    pub authorizer: Arc<Authorizer>,
    pub identifiers: IdentifierStrategy,
    /// Upper bound on a single authorization.
    pub deadline: Option<Duration>,
}

impl AppState {
    pub fn new(authorizer: Arc<Authorizer>, identifiers: IdentifierStrategy) -> Self {
        Self {
            authorizer,
            identifiers,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Builds the authorizer described by `config`.
    pub fn from_config(config: &AuthorizationConfig, collaborators: &Collaborators) -> authz::Result<Self> {
        let authorizer = config.build(collaborators)?;
        let mut state = Self::new(Arc::new(authorizer), IdentifierStrategy::new(&config.base_url)?);
        state.deadline = config.deadline();
        Ok(state)
    }
}

/// Wraps the application's resource routes with authorization and tracing.
///
/// `routes` should include its fallback before being passed in, so the
/// middleware covers it too.
pub fn create_router(state: AppState, routes: Router) -> Router {
    let cors = CorsLayer::permissive().expose_headers([
        HeaderName::from_static(wac_allow::WAC_ALLOW),
        axum::http::header::WWW_AUTHENTICATE,
    ]);

    routes
        .layer(middleware::from_fn_with_state(
            state,
            middleware_hooks::authorization_middleware,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}
