use crate::utils::settings::Settings;
use anyhow::Result;

/// Print the effective configuration, defaults filled in.
pub async fn show(settings: &Settings, format: String) -> Result<()> {
    match format.as_str() {
        "json" => {
            let json_output = serde_json::to_string_pretty(settings)?;
            println!("{}", json_output);
        }
        _ => {
            let yaml_output = serde_yaml::to_string(settings)?;
            println!("{}", yaml_output);
        }
    }

    Ok(())
}
