use authz::identifier::canonical_iri;
use authz::{Credentials, IdentifierStrategy, ResourceIdentifier};
use clap::Args;

pub mod check;
pub mod config;
pub mod permissions;

/// Who is asking.
#[derive(Args, Debug, Clone, Default)]
pub struct AgentArgs {
    /// WebID of the agent (anonymous if omitted)
    #[arg(long)]
    pub web_id: Option<String>,

    /// Client application identifier
    #[arg(long)]
    pub client_id: Option<String>,

    /// Identity provider that issued the credentials
    #[arg(long)]
    pub issuer: Option<String>,
}

impl AgentArgs {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            web_id: self.web_id.clone(),
            client_id: self.client_id.clone(),
            issuer: self.issuer.clone(),
        }
    }

    pub fn describe(&self) -> String {
        self.web_id.clone().unwrap_or_else(|| "anonymous".to_string())
    }
}

/// Accepts either an absolute URI or a path relative to the base URL.
pub fn resolve_target(identifiers: &IdentifierStrategy, target: &str) -> ResourceIdentifier {
    if target.starts_with("http://") || target.starts_with("https://") {
        ResourceIdentifier::new(canonical_iri(target))
    } else {
        identifiers.resolve_relative(target)
    }
}
