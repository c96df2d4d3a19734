use super::{resolve_target, AgentArgs};
use crate::utils::settings::Settings;
use anyhow::{Context, Result};
use authz::{Authorization, Decision, Method, Operation, PatchBody};
use colored::*;
use std::str::FromStr;

pub struct CheckRequest {
    pub method: String,
    pub target: String,
    pub agent: AgentArgs,
    pub content_type: Option<String>,
    pub patch: Option<String>,
}

/// Run one authorization and print the outcome.
///
/// Returns the decision so the caller can pick the exit status.
pub async fn execute(settings: &Settings, request: CheckRequest, format: String) -> Result<Decision> {
    let identifiers = settings.identifiers()?;
    let authorizer = settings.authorizer()?;

    let method = Method::from_str(&request.method)?;
    let mut operation = Operation::new(method, resolve_target(&identifiers, &request.target));
    if let Some(content_type) = request.content_type {
        operation = operation.with_content_type(content_type);
    }
    if let Some(patch) = request.patch {
        let body: PatchBody = serde_json::from_str(&patch).context("Invalid --patch JSON")?;
        operation = operation.with_patch(body);
    }

    let authorization = match settings.authorization.deadline() {
        Some(deadline) => {
            let deadline = tokio::time::Instant::now() + deadline;
            authorizer
                .authorize_until(&operation, &request.agent.credentials(), deadline)
                .await?
        }
        None => {
            authorizer
                .authorize(&operation, &request.agent.credentials())
                .await?
        }
    };

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&authorization)?);
        }
        _ => {
            print_authorization_text(&operation, &request.agent, &authorization);
        }
    }

    Ok(authorization.decision)
}

fn print_authorization_text(operation: &Operation, agent: &AgentArgs, authorization: &Authorization) {
    println!("{}", "=== Authorization Check ===".bold());
    println!();
    println!("  {} {} {}", "Operation:".cyan(), operation.method, operation.target);
    println!("  {} {}", "Agent:".cyan(), agent.describe());

    let decision = match authorization.decision {
        Decision::Allow => "ALLOW".green().bold(),
        Decision::Unauthenticated => "UNAUTHENTICATED".yellow().bold(),
        Decision::Forbidden => "FORBIDDEN".red().bold(),
    };
    println!("  {} {}", "Decision:".cyan(), decision);
    println!();

    println!("{}", "Required:".bold());
    for (resource, modes) in authorization.required.iter() {
        let modes: Vec<&str> = modes.iter().map(|mode| mode.as_str()).collect();
        println!("  {} {}", resource, modes.join(" "));
    }

    println!("{}", "Granted:".bold());
    for (resource, permissions) in authorization.granted.iter() {
        println!("  {} {}", resource, permissions);
    }

    if !authorization.violations.is_empty() {
        println!("{}", "Violations:".bold());
        for violation in &authorization.violations {
            println!(
                "  {} {} ({:?})",
                violation.resource,
                violation.mode.to_string().red(),
                violation.grant
            );
        }
    }
}
