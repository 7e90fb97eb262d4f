use std::path::Path;
use std::process;

use crate::OutputFormat;

pub(crate) fn cmd_check(config_path: &Path, output: OutputFormat, quiet: bool) {
    let config = super::load_config(config_path, output, quiet);
    let problems = config.validate();

    if problems.is_empty() {
        if !quiet {
            match output {
                OutputFormat::Text => println!(
                    "valid: {} service(s), vault {}",
                    config.services.len(),
                    if config.vault.enabled { "enabled" } else { "disabled" }
                ),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({
                        "valid": true,
                        "services": config.services.len(),
                        "vault": config.vault.enabled,
                    })
                ),
            }
        }
        return;
    }

    tracing::debug!(problems = problems.len(), "configuration is invalid");
    match output {
        OutputFormat::Text => {
            if !quiet {
                eprintln!("invalid configuration");
                for problem in &problems {
                    eprintln!("  - {}", problem);
                }
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({ "valid": false, "errors": problems });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
    }
    process::exit(1);
}
