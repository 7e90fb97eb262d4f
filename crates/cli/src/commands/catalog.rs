use std::path::Path;

use crate::OutputFormat;

pub(crate) fn cmd_catalog(config_path: &Path, output: OutputFormat, quiet: bool) {
    let config = super::load_config(config_path, output, quiet);
    let services: Vec<_> = config
        .services
        .iter()
        .filter(|s| s.enabled)
        .map(|s| s.catalog_entry())
        .collect();

    match output {
        OutputFormat::Json => {
            let json = serde_json::json!({ "services": services });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
        OutputFormat::Text => {
            if services.is_empty() {
                if !quiet {
                    println!("no enabled services");
                }
                return;
            }
            for service in &services {
                println!("{} ({})", service.name, service.id);
                if !quiet && !service.description.is_empty() {
                    println!("  {}", service.description);
                }
                for plan in &service.plans {
                    println!("  plan {} ({})", plan.name, plan.id);
                }
            }
        }
    }
}
