use anyhow::Result;
use regex::Regex;
use std::sync::LazyLock;

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}:]+)(?::-(.*?))?\}").expect("env var pattern is valid"));

/// Namespace of query macros expanded at fetch time, never read from the environment
const TIME_MACRO_NAMESPACE: &str = "Time.";

/// Interpolate environment variables in a string
/// Supports ${VAR} and ${VAR:-default} syntax
pub fn interpolate_env_vars(input: &str) -> Result<String> {
    let mut result = input.to_string();
    let mut missing_vars = Vec::new();

    for cap in ENV_VAR.captures_iter(input) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else { continue };
        let var_name = var_name.as_str().trim();
        if var_name.starts_with(TIME_MACRO_NAMESPACE) {
            continue;
        }
        let default_value = cap.get(2).map(|m| m.as_str());

        let value = match std::env::var(var_name) {
            Ok(val) => val,
            Err(_) => {
                if let Some(default) = default_value {
                    default.to_string()
                } else {
                    missing_vars.push(var_name.to_string());
                    continue;
                }
            }
        };

        result = result.replace(full_match.as_str(), &value);
    }

    if !missing_vars.is_empty() {
        anyhow::bail!("Missing required environment variables: {}", missing_vars.join(", "));
    }

    Ok(result)
}

/// Interpolate environment variables in YAML content
pub fn interpolate_yaml_content(yaml_content: &str) -> Result<String> {
    let lines: Vec<String> = yaml_content
        .lines()
        .map(|line| {
            // Don't interpolate comments
            if line.trim().starts_with('#') {
                return Ok(line.to_string());
            }

            interpolate_env_vars(line)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(lines.join("\n"))
}
