use super::{resolve_target, AgentArgs};
use crate::utils::settings::Settings;
use anyhow::Result;
use authz::{AccessMap, AccessMode, ModeSet, PermissionMap};
use colored::*;

/// Print the raw permissions the configured readers produce for every mode
/// on each target.
pub async fn execute(settings: &Settings, targets: Vec<String>, agent: AgentArgs, format: String) -> Result<()> {
    let identifiers = settings.identifiers()?;
    let authorizer = settings.authorizer()?;

    let requested: AccessMap = targets
        .iter()
        .map(|target| {
            (
                resolve_target(&identifiers, target),
                ModeSet::from(AccessMode::ALL),
            )
        })
        .collect();

    let permissions = authorizer.permissions(&agent.credentials(), &requested).await;

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&permissions)?);
        }
        "yaml" => {
            println!("{}", serde_yaml::to_string(&permissions)?);
        }
        _ => {
            print_permissions_text(&requested, &permissions, &agent);
        }
    }

    Ok(())
}

fn print_permissions_text(requested: &AccessMap, permissions: &PermissionMap, agent: &AgentArgs) {
    println!("{} {}", "=== Permissions for".bold(), format!("{} ===", agent.describe()).bold());
    println!();

    for resource in requested.resources() {
        let set = permissions.get(resource);
        let modes: Vec<String> = AccessMode::ALL
            .iter()
            .map(|mode| {
                let grant = set.get(*mode);
                if grant.is_granted() {
                    mode.as_str().green().to_string()
                } else if grant.is_defined() {
                    mode.as_str().red().to_string()
                } else {
                    mode.as_str().dimmed().to_string()
                }
            })
            .collect();
        println!("  {} {}", resource.to_string().cyan(), modes.join(" "));
    }
}
